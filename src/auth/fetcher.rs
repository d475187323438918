//! Network exchange of credentials for bearer tokens.

// std
use std::time::Instant;
// crates.io
use reqwest::{
	StatusCode,
	header::{ACCEPT, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	auth::{credentials::Credentials, secret::TokenSecret, token::CachedToken},
	error::{ApiError, ErrorKind},
	http::ResponseMetadata,
	obs::{self, RequestKind, RequestOutcome, RequestSpan},
};

const METHOD: &str = "POST";

/// Wire payload accepted from the identity endpoint.
#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
	access_token: String,
	expires_in: i64,
	#[serde(default)]
	token_type: Option<String>,
}

/// Error payload shape returned by the identity endpoint on rejection.
#[derive(Debug, Deserialize)]
struct IdentityErrorBody {
	#[serde(default)]
	error: Option<serde_json::Value>,
}

/// Performs exactly one credentials-for-token network exchange per call.
///
/// Transport-level errors, non-200 statuses, and malformed or non-positive token payloads are
/// all surfaced as [`ErrorKind::Auth`] classified errors. The fetcher never retries; retry
/// policy is strictly a transport-level concern layered above it.
#[derive(Clone, Debug)]
pub struct TokenFetcher {
	http: ReqwestClient,
	credentials: Credentials,
}
impl TokenFetcher {
	/// Creates a fetcher bound to the provided HTTP client and credentials.
	pub fn new(http: ReqwestClient, credentials: Credentials) -> Self {
		Self { http, credentials }
	}

	/// Returns the endpoint this fetcher exchanges credentials against.
	pub fn token_url(&self) -> &Url {
		self.credentials.token_url()
	}

	/// JSON body summary safe for logs; the password field is redacted.
	pub fn redacted_request_body(&self) -> String {
		serde_json::json!({
			"client_id": self.credentials.client_id(),
			"password": TokenSecret::REDACTED,
		})
		.to_string()
	}

	/// Exchanges the stored credentials for a fresh token.
	pub async fn fetch(&self) -> Result<CachedToken, ApiError> {
		let span = RequestSpan::new(RequestKind::TokenExchange, "fetch");

		obs::record_request_outcome(RequestKind::TokenExchange, RequestOutcome::Attempt);

		let result = span.instrument(self.exchange()).await;

		match &result {
			Ok(_) =>
				obs::record_request_outcome(RequestKind::TokenExchange, RequestOutcome::Success),
			Err(_) =>
				obs::record_request_outcome(RequestKind::TokenExchange, RequestOutcome::Failure),
		}

		result
	}

	async fn exchange(&self) -> Result<CachedToken, ApiError> {
		let endpoint = self.credentials.token_url().clone();
		let payload = serde_json::json!({
			"client_id": self.credentials.client_id(),
			"password": self.credentials.password().expose(),
		});

		#[cfg(feature = "tracing")]
		tracing::debug!(
			endpoint = %endpoint,
			body = %self.redacted_request_body(),
			"Dispatching token exchange.",
		);

		let started = Instant::now();
		let response = self
			.http
			.post(endpoint.clone())
			.header(CONTENT_TYPE, "application/json")
			.header(ACCEPT, "application/json")
			.json(&payload)
			.send()
			.await
			.map_err(|source| self.network_error(&endpoint, started.elapsed(), &source))?;
		let status = response.status();
		let metadata = ResponseMetadata::capture(&response, started.elapsed());
		let bytes = response
			.bytes()
			.await
			.map_err(|source| self.network_error(&endpoint, started.elapsed(), &source))?;

		#[cfg(feature = "tracing")]
		tracing::debug!(
			endpoint = %endpoint,
			status = status.as_u16(),
			"Token exchange completed.",
		);

		if status != StatusCode::OK {
			let mut error = self.auth_error(
				&endpoint,
				format!("Token endpoint returned status {}", status.as_u16()),
				metadata,
			);

			if let Some(code) = identity_error_code(&bytes) {
				error = error.with_code(code);
			}

			return Err(error);
		}

		let decoded = self.decode(&endpoint, &metadata, &bytes)?;

		self.token_from(&endpoint, decoded)
	}

	fn token_from(
		&self,
		endpoint: &Url,
		decoded: TokenExchangeResponse,
	) -> Result<CachedToken, ApiError> {
		if decoded.access_token.is_empty() {
			return Err(self.auth_error(
				endpoint,
				"Token endpoint response is missing access_token",
				ResponseMetadata::default(),
			));
		}
		if decoded.expires_in <= 0 {
			return Err(self.auth_error(
				endpoint,
				"The expires_in value must be positive",
				ResponseMetadata::default(),
			));
		}

		let issued_at = OffsetDateTime::now_utc();
		let token = CachedToken {
			access_token: TokenSecret::new(decoded.access_token),
			token_type: decoded.token_type.unwrap_or_else(|| "Bearer".to_owned()),
			issued_at,
			expires_at: issued_at + Duration::seconds(decoded.expires_in),
		};

		#[cfg(feature = "tracing")]
		tracing::debug!(
			token_type = %token.token_type,
			expires_at = %token.expires_at,
			access_token = %token.access_token,
			"Token exchange succeeded.",
		);

		Ok(token)
	}

	fn decode(
		&self,
		endpoint: &Url,
		metadata: &ResponseMetadata,
		bytes: &[u8],
	) -> Result<TokenExchangeResponse, ApiError> {
		let mut deserializer = serde_json::Deserializer::from_slice(bytes);

		serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
			self.auth_error(
				endpoint,
				format!("Token endpoint returned malformed JSON ({err})"),
				metadata.clone(),
			)
		})
	}

	fn auth_error(
		&self,
		endpoint: &Url,
		message: impl Into<String>,
		metadata: ResponseMetadata,
	) -> ApiError {
		ApiError::new(ErrorKind::Auth, METHOD, endpoint.as_str(), message).with_metadata(metadata)
	}

	fn network_error(
		&self,
		endpoint: &Url,
		elapsed: std::time::Duration,
		source: &reqwest::Error,
	) -> ApiError {
		self.auth_error(
			endpoint,
			format!("Network error occurred while calling the token endpoint: {source}"),
			ResponseMetadata::unanswered(elapsed),
		)
	}
}

fn identity_error_code(bytes: &[u8]) -> Option<String> {
	match serde_json::from_slice::<IdentityErrorBody>(bytes).ok()?.error? {
		serde_json::Value::String(code) => Some(code),
		other => Some(other.to_string()),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn fetcher() -> TokenFetcher {
		let credentials = Credentials::new(
			"unit-client",
			"unit-password",
			Url::parse("https://id.example.com/token")
				.expect("Token URL fixture should be valid."),
		)
		.expect("Credential fixture should be valid.");

		TokenFetcher::new(ReqwestClient::new(), credentials)
	}

	#[test]
	fn request_body_summary_never_contains_the_password() {
		let rendered = fetcher().redacted_request_body();

		assert!(rendered.contains("unit-client"));
		assert!(!rendered.contains("unit-password"));
		assert!(rendered.contains(TokenSecret::REDACTED));
	}

	#[test]
	fn identity_error_codes_survive_both_shapes() {
		assert_eq!(
			identity_error_code(br#"{"error":"invalid_client"}"#),
			Some("invalid_client".into()),
		);
		assert_eq!(
			identity_error_code(br#"{"error":{"code":"bad"}}"#),
			Some("{\"code\":\"bad\"}".into()),
		);
		assert_eq!(identity_error_code(b"not json"), None);
		assert_eq!(identity_error_code(br#"{"other":1}"#), None);
	}

	#[test]
	fn empty_and_non_positive_tokens_are_rejected() {
		let fetcher = fetcher();
		let endpoint = fetcher.token_url().clone();
		let err = fetcher
			.token_from(
				&endpoint,
				TokenExchangeResponse {
					access_token: String::new(),
					expires_in: 3_600,
					token_type: None,
				},
			)
			.expect_err("Empty access tokens must be rejected.");

		assert_eq!(err.kind, ErrorKind::Auth);
		assert!(err.to_string().contains("access_token"));

		let err = fetcher
			.token_from(
				&endpoint,
				TokenExchangeResponse {
					access_token: "tok".into(),
					expires_in: 0,
					token_type: None,
				},
			)
			.expect_err("Non-positive lifetimes must be rejected.");

		assert_eq!(err.kind, ErrorKind::Auth);
		assert!(err.to_string().contains("expires_in"));
	}

	#[test]
	fn token_type_defaults_to_bearer() {
		let fetcher = fetcher();
		let endpoint = fetcher.token_url().clone();
		let token = fetcher
			.token_from(
				&endpoint,
				TokenExchangeResponse {
					access_token: "tok".into(),
					expires_in: 60,
					token_type: None,
				},
			)
			.expect("A positive lifetime should produce a cached token.");

		assert_eq!(token.token_type, "Bearer");
		assert!(token.remaining_at(OffsetDateTime::now_utc()) > Duration::seconds(50));
	}
}
