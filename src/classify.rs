//! HTTP status and GraphQL payload classification into the client error taxonomy.
//!
//! The classifier turns a status code plus an optional structured payload, or a list of
//! GraphQL errors, into exactly one [`ApiError`]. GraphQL servers routinely report domain
//! errors inside a 200 envelope, so the `errors[]` array is scanned even when the HTTP layer
//! reports success.

// std
use std::fmt::Write as _;
// self
use crate::{
	_prelude::*,
	error::{ApiError, ErrorKind},
	http::ResponseMetadata,
};

/// Structured REST error payload, `{"error":{"code","message"}}` or `{"error":"code"}`.
#[derive(Debug, Deserialize)]
struct RestErrorEnvelope {
	#[serde(default)]
	error: Option<RestErrorBody>,
}
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RestErrorBody {
	Structured {
		#[serde(default)]
		code: Option<String>,
		#[serde(default)]
		message: Option<String>,
	},
	Bare(String),
}

/// One entry of a GraphQL `errors[]` payload.
#[derive(Clone, Debug, Deserialize)]
pub struct GraphqlError {
	/// Human-readable message reported by the server.
	#[serde(default)]
	pub message: String,
	/// Response path the error applies to; field names and list indices mixed.
	#[serde(default)]
	pub path: Vec<serde_json::Value>,
	/// Query source locations associated with the error.
	#[serde(default)]
	pub locations: Vec<GraphqlErrorLocation>,
	/// Server-defined extension payload.
	#[serde(default)]
	pub extensions: Option<serde_json::Value>,
}

/// Line/column pair inside the originating GraphQL document.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct GraphqlErrorLocation {
	/// 1-based source line.
	pub line: u32,
	/// 1-based source column.
	pub column: u32,
}

/// Maps an HTTP status code into the taxonomy.
pub fn kind_for_status(status: u16) -> ErrorKind {
	match status {
		401 => ErrorKind::Auth,
		403 => ErrorKind::Forbidden,
		404 => ErrorKind::NotFound,
		409 | 422 => ErrorKind::Validation,
		429 => ErrorKind::RateLimited,
		502..=504 => ErrorKind::Transient,
		code if code >= 500 => ErrorKind::ServerError,
		_ => ErrorKind::Unknown,
	}
}

/// Classifies a non-2xx HTTP response, folding in the structured error payload when present.
pub fn classify_response(
	method: &str,
	endpoint: &str,
	metadata: ResponseMetadata,
	body: &[u8],
) -> ApiError {
	let status = metadata.status.unwrap_or_default();
	let kind = kind_for_status(status);
	let (code, message) = rest_error_fields(body);
	let message = message.unwrap_or_else(|| format!("Endpoint returned status {status}"));
	let mut error = ApiError::new(kind, method, endpoint, message).with_metadata(metadata);

	if let Some(code) = code {
		error = error.with_code(code);
	}

	error
}

/// Classifies a GraphQL `errors[]` payload delivered alongside any HTTP status.
///
/// Any entry whose message mentions "not found" (case-insensitive, spaced or underscored)
/// marks the aggregate as [`ErrorKind::NotFound`] regardless of the nominal status;
/// everything else is a domain-level validation failure. The result always carries the
/// GraphQL origin marker so callers can distinguish transport failures from API-logic ones.
pub fn classify_graphql(
	method: &str,
	endpoint: &str,
	metadata: ResponseMetadata,
	errors: &[GraphqlError],
) -> ApiError {
	let not_found = errors.iter().any(|error| {
		let lowered = error.message.to_ascii_lowercase();

		lowered.contains("not found") || lowered.contains("not_found")
	});
	let kind = if not_found { ErrorKind::NotFound } else { ErrorKind::Validation };
	let message = errors.iter().map(render_graphql_error).collect::<Vec<_>>().join("; ");

	ApiError::new(kind, method, endpoint, message).with_metadata(metadata).graphql_origin()
}

/// Renders one GraphQL error with its path, locations, and extensions preserved as suffixes.
fn render_graphql_error(error: &GraphqlError) -> String {
	let mut buf = error.message.clone();
	let mut parts = Vec::new();

	if !error.path.is_empty() {
		parts.push(format!("path: {}", render_path(&error.path)));
	}
	if !error.locations.is_empty() {
		let joined = error
			.locations
			.iter()
			.map(|location| format!("{}:{}", location.line, location.column))
			.collect::<Vec<_>>()
			.join(",");

		parts.push(format!("locations: {joined}"));
	}
	if let Some(extensions) = &error.extensions {
		parts.push(format!("extensions: {extensions}"));
	}

	if !parts.is_empty() {
		let _ = write!(buf, " ({})", parts.join(", "));
	}

	buf
}

fn render_path(path: &[serde_json::Value]) -> String {
	path.iter()
		.map(|segment| match segment {
			serde_json::Value::String(name) => name.clone(),
			other => other.to_string(),
		})
		.collect::<Vec<_>>()
		.join(".")
}

fn rest_error_fields(body: &[u8]) -> (Option<String>, Option<String>) {
	match serde_json::from_slice::<RestErrorEnvelope>(body) {
		Ok(RestErrorEnvelope { error: Some(RestErrorBody::Structured { code, message }) }) =>
			(code, message),
		Ok(RestErrorEnvelope { error: Some(RestErrorBody::Bare(code)) }) => (Some(code), None),
		_ => (None, None),
	}
}
