//! Client-wide error types shared across the token lifecycle and transport layers.

// self
use crate::{_prelude::*, http::ResponseMetadata};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem; fatal, raised before any network activity.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Classified failure of an outbound call (token exchange, REST, or GraphQL).
	#[error(transparent)]
	Api(Box<ApiError>),
}
impl Error {
	/// Returns the classification kind for API failures.
	pub fn kind(&self) -> Option<ErrorKind> {
		match self {
			Self::Api(api) => Some(api.kind),
			Self::Config(_) => None,
		}
	}

	/// Returns the embedded classified error, when present.
	pub fn as_api(&self) -> Option<&ApiError> {
		match self {
			Self::Api(api) => Some(api.as_ref()),
			Self::Config(_) => None,
		}
	}
}
impl From<ApiError> for Error {
	fn from(error: ApiError) -> Self {
		Self::Api(Box::new(error))
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: reqwest::Error,
	},
	/// A required credential field was empty.
	#[error("The {field} credential field must not be empty.")]
	EmptyCredentialField {
		/// Which credential field failed validation.
		field: &'static str,
	},
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// The built-in default base URL failed to parse.
	#[error("The base URL is invalid: {url}.")]
	InvalidBaseUrl {
		/// URL string that failed validation.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request path cannot be joined onto the base URL.
	#[error("Request path `{path}` cannot be joined onto the base URL.")]
	InvalidPath {
		/// Path that failed to join.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request timeout must be positive.
	#[error("The request timeout must be positive.")]
	NonPositiveTimeout,
	/// Retry policy wait bounds are inverted or negative.
	#[error("The retry minimum wait must be non-negative and must not exceed the maximum wait.")]
	InvalidRetryBounds,
	/// Refresh skew must not be negative.
	#[error("The refresh skew must not be negative.")]
	NegativeRefreshSkew,
}

/// Closed classification taxonomy for failed outbound calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Authentication failed (401, or any failed token exchange).
	Auth,
	/// Authenticated but not permitted (403).
	Forbidden,
	/// The addressed resource does not exist.
	NotFound,
	/// The request payload was rejected (409/422, or a GraphQL domain error).
	Validation,
	/// Upstream throttled the caller (429).
	RateLimited,
	/// Temporary failure expected to succeed on retry (network blip, 502/503/504).
	Transient,
	/// Upstream server failure (other 5xx).
	ServerError,
	/// Anything the classifier cannot place.
	Unknown,
}
impl ErrorKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorKind::Auth => "auth",
			ErrorKind::Forbidden => "forbidden",
			ErrorKind::NotFound => "not_found",
			ErrorKind::Validation => "validation",
			ErrorKind::RateLimited => "rate_limited",
			ErrorKind::Transient => "transient",
			ErrorKind::ServerError => "server_error",
			ErrorKind::Unknown => "unknown",
		}
	}

	/// Returns `true` for the authentication family (401 and 403).
	pub const fn is_auth(self) -> bool {
		matches!(self, Self::Auth | Self::Forbidden)
	}

	/// Returns `true` when the transport may retry without caller intervention.
	pub const fn is_retryable(self) -> bool {
		matches!(self, Self::Transient | Self::RateLimited)
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Classified failure of one outbound call; created once per failed call and immutable.
///
/// The struct is `Clone` so a single refresh outcome can fan out to every coalesced waiter,
/// and it embeds the captured [`ResponseMetadata`] so header-dependent backoff decisions
/// (`Retry-After`, rate-limit reset headers) remain possible after a failure.
#[derive(Clone, Debug)]
pub struct ApiError {
	/// Taxonomy tag for the failure.
	pub kind: ErrorKind,
	/// Machine-readable error code supplied by the API, when present.
	pub code: Option<String>,
	/// Human-readable message describing the failure.
	pub message: String,
	/// HTTP method of the failing call.
	pub method: String,
	/// Endpoint (path or URL) of the failing call.
	pub endpoint: String,
	/// Marks failures that originate from a GraphQL `errors[]` payload.
	pub graphql: bool,
	/// Metadata captured from the HTTP response; defaulted when no response was received.
	/// Boxed so error values stay small on the `Result` fast path.
	pub metadata: Box<ResponseMetadata>,
}
impl ApiError {
	/// Creates a classified error for the provided call context.
	pub fn new(
		kind: ErrorKind,
		method: impl Into<String>,
		endpoint: impl Into<String>,
		message: impl Into<String>,
	) -> Self {
		Self {
			kind,
			code: None,
			message: message.into(),
			method: method.into(),
			endpoint: endpoint.into(),
			graphql: false,
			metadata: Box::default(),
		}
	}

	/// Attaches a machine-readable error code.
	pub fn with_code(mut self, code: impl Into<String>) -> Self {
		self.code = Some(code.into());

		self
	}

	/// Attaches the captured response metadata.
	pub fn with_metadata(mut self, metadata: ResponseMetadata) -> Self {
		self.metadata = Box::new(metadata);

		self
	}

	/// Marks the error as originating from a GraphQL `errors[]` payload.
	pub fn graphql_origin(mut self) -> Self {
		self.graphql = true;

		self
	}

	/// HTTP status of the failing response, when one was received.
	pub fn status(&self) -> Option<u16> {
		self.metadata.status
	}

	/// Returns `true` when the transport may retry this failure.
	pub fn is_retryable(&self) -> bool {
		self.kind.is_retryable()
	}
}
impl Display for ApiError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} {} failed with {}", self.method, self.endpoint, self.kind)?;

		if let Some(status) = self.metadata.status {
			write!(f, " (status {status})")?;
		}
		if let Some(code) = &self.code {
			write!(f, " [{code}]")?;
		}
		if !self.message.is_empty() {
			write!(f, ": {}", self.message)?;
		}

		f.write_str(".")
	}
}
impl StdError for ApiError {}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn kind_families_cover_auth_and_retry() {
		assert!(ErrorKind::Auth.is_auth());
		assert!(ErrorKind::Forbidden.is_auth());
		assert!(!ErrorKind::NotFound.is_auth());
		assert!(ErrorKind::Transient.is_retryable());
		assert!(ErrorKind::RateLimited.is_retryable());
		assert!(!ErrorKind::Validation.is_retryable());
	}

	#[test]
	fn display_carries_status_code_and_message() {
		let metadata = ResponseMetadata { status: Some(401), ..ResponseMetadata::default() };
		let error = ApiError::new(ErrorKind::Auth, "POST", "/token", "Token endpoint rejected the credentials")
			.with_code("invalid_client")
			.with_metadata(metadata);
		let rendered = error.to_string();

		assert!(rendered.contains("401"));
		assert!(rendered.contains("invalid_client"));
		assert!(rendered.contains("rejected the credentials"));
	}

	#[test]
	fn api_errors_convert_into_the_crate_error() {
		let error: Error = ApiError::new(ErrorKind::NotFound, "GET", "/v1/plans/42", "").into();

		assert_eq!(error.kind(), Some(ErrorKind::NotFound));
		assert!(error.as_api().is_some());
	}
}
