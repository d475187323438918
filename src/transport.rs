//! Authenticated request transport with bounded retry and response classification.
//!
//! Every outbound call follows the same pipeline: obtain a valid token from the
//! [`TokenManager`], attach it as a bearer credential, execute the HTTP call, retry
//! retryable failures under a bounded exponential backoff, and classify whatever comes back.
//! Response metadata survives both branches, inside [`ApiResponse`] on success and embedded
//! in the classified error on failure, so callers can always inspect status and headers.

// std
use std::time::{Duration as StdDuration, Instant};
// crates.io
use rand::Rng;
use reqwest::{
	Method,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenFetcher, TokenManager},
	classify,
	config::{ClientConfig, RetryPolicy},
	error::{ApiError, ConfigError, ErrorKind},
	http::{self, ApiResponse, ResponseMetadata},
	obs::{self, RequestKind, RequestOutcome, RequestSpan},
};

/// GraphQL response envelope scanned for `errors[]` before data is surfaced.
#[derive(Debug, Deserialize)]
struct GraphqlEnvelope {
	#[serde(default)]
	data: Option<serde_json::Value>,
	#[serde(default)]
	errors: Vec<classify::GraphqlError>,
}

/// Executes outbound calls with authentication, retry, and classification.
///
/// One transport owns one [`TokenManager`], which owns one [`Credentials`] triple;
/// independent transports never share token state.
#[derive(Clone, Debug)]
pub struct Transport {
	config: ClientConfig,
	http: ReqwestClient,
	tokens: TokenManager,
}
impl Transport {
	/// Builds a transport with a crate-provisioned HTTP client.
	///
	/// The provisioned client applies the configured timeout and User-Agent and disables
	/// redirects. Use [`Transport::with_http_client`] for custom proxy/TLS settings.
	pub fn new(config: ClientConfig, credentials: Credentials) -> Result<Self> {
		let http = http::default_http_client(config.timeout, &config.user_agent())?;

		Ok(Self::assemble(config, credentials, http))
	}

	/// Builds a transport around a caller-provided HTTP client.
	pub fn with_http_client(
		config: ClientConfig,
		credentials: Credentials,
		http: ReqwestClient,
	) -> Self {
		Self::assemble(config, credentials, http)
	}

	fn assemble(config: ClientConfig, credentials: Credentials, http: ReqwestClient) -> Self {
		let fetcher = TokenFetcher::new(http.clone(), credentials);
		let tokens = TokenManager::with_refresh_skew(fetcher, config.refresh_skew);

		Self { config, http, tokens }
	}

	/// Returns the token manager owned by this transport.
	pub fn token_manager(&self) -> &TokenManager {
		&self.tokens
	}

	/// Returns the configuration the transport was built with.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Convenience wrapper for GET requests.
	pub async fn get(&self, path: &str) -> Result<ApiResponse> {
		self.execute(Method::GET, path, None, None).await
	}

	/// Convenience wrapper for POST requests with a JSON body.
	pub async fn post(&self, path: &str, body: &serde_json::Value) -> Result<ApiResponse> {
		self.execute(Method::POST, path, Some(body), None).await
	}

	/// Executes one authenticated call against `path`, retrying retryable failures.
	///
	/// The call fails fast with the auth error when no token can be obtained; no network
	/// call is attempted without one. An observed 401 invalidates the cached token so the
	/// next call starts from a forced refresh.
	pub async fn execute(
		&self,
		method: Method,
		path: &str,
		body: Option<&serde_json::Value>,
		headers: Option<HeaderMap>,
	) -> Result<ApiResponse> {
		let span = RequestSpan::new(RequestKind::Api, "execute");

		obs::record_request_outcome(RequestKind::Api, RequestOutcome::Attempt);

		let result = span.instrument(self.execute_inner(method, path, body, headers)).await;

		match &result {
			Ok(_) => obs::record_request_outcome(RequestKind::Api, RequestOutcome::Success),
			Err(_) => obs::record_request_outcome(RequestKind::Api, RequestOutcome::Failure),
		}

		result
	}

	/// Executes a GraphQL operation and classifies `errors[]` even inside a 200 envelope.
	///
	/// Returns the `data` member when the server reports no errors.
	pub async fn graphql(
		&self,
		query: &str,
		variables: serde_json::Value,
	) -> Result<serde_json::Value> {
		let span = RequestSpan::new(RequestKind::Graphql, "graphql");

		obs::record_request_outcome(RequestKind::Graphql, RequestOutcome::Attempt);

		let result = span.instrument(self.graphql_inner(query, variables)).await;

		match &result {
			Ok(_) => obs::record_request_outcome(RequestKind::Graphql, RequestOutcome::Success),
			Err(_) => obs::record_request_outcome(RequestKind::Graphql, RequestOutcome::Failure),
		}

		result
	}

	async fn execute_inner(
		&self,
		method: Method,
		path: &str,
		body: Option<&serde_json::Value>,
		headers: Option<HeaderMap>,
	) -> Result<ApiResponse> {
		let token = self.tokens.token().await.map_err(Error::from)?;
		let url = self.request_url(path)?;
		let bearer = bearer_header(token.access_token.expose(), &method, path)?;
		let mut attempt = 0_u32;

		loop {
			match self.dispatch(&method, &url, path, body, headers.as_ref(), &bearer).await {
				Ok(response) => return Ok(response),
				Err(err) => {
					if err.kind == ErrorKind::Auth {
						// The server rejected a token the cache still considered valid.
						self.tokens.invalidate();
					}
					if !err.is_retryable() || attempt >= self.config.retry.max_retries {
						return Err(err.into());
					}

					let delay =
						retry_delay(&self.config.retry, attempt, err.metadata.retry_after);

					#[cfg(feature = "tracing")]
					tracing::debug!(
						path,
						attempt,
						delay_ms = delay.whole_milliseconds() as i64,
						kind = err.kind.as_str(),
						"Retrying after a retryable failure.",
					);

					tokio::time::sleep(to_std(delay)).await;

					attempt += 1;
				},
			}
		}
	}

	async fn graphql_inner(
		&self,
		query: &str,
		variables: serde_json::Value,
	) -> Result<serde_json::Value> {
		let path = self.config.graphql_path.clone();
		let payload = serde_json::json!({ "query": query, "variables": variables });
		let response = self.execute_inner(Method::POST, &path, Some(&payload), None).await?;
		let envelope: GraphqlEnvelope = response.json().map_err(|err| {
			ApiError::new(
				ErrorKind::Unknown,
				Method::POST.as_str(),
				&path,
				format!("GraphQL endpoint returned malformed JSON ({err})"),
			)
			.with_metadata(response.metadata.clone())
		})?;

		if !envelope.errors.is_empty() {
			return Err(classify::classify_graphql(
				Method::POST.as_str(),
				&path,
				response.metadata,
				&envelope.errors,
			)
			.into());
		}

		Ok(envelope.data.unwrap_or(serde_json::Value::Null))
	}

	async fn dispatch(
		&self,
		method: &Method,
		url: &Url,
		path: &str,
		body: Option<&serde_json::Value>,
		headers: Option<&HeaderMap>,
		bearer: &HeaderValue,
	) -> Result<ApiResponse, ApiError> {
		let mut request = self
			.http
			.request(method.clone(), url.clone())
			.header(AUTHORIZATION, bearer.clone())
			.header(ACCEPT, "application/json");

		if let Some(extra) = headers {
			request = request.headers(extra.clone());
		}
		if let Some(payload) = body {
			request = request.header(CONTENT_TYPE, "application/json").json(payload);
		}

		let started = Instant::now();
		let response = request
			.send()
			.await
			.map_err(|source| network_error(method, path, started.elapsed(), &source))?;
		let status = response.status();
		let metadata = ResponseMetadata::capture(&response, started.elapsed());
		let bytes = response
			.bytes()
			.await
			.map_err(|source| network_error(method, path, started.elapsed(), &source))?;

		#[cfg(feature = "tracing")]
		tracing::debug!(
			method = %method,
			path,
			status = status.as_u16(),
			elapsed_ms = metadata.elapsed.as_millis() as u64,
			"Request completed.",
		);

		if status.is_success() {
			return Ok(ApiResponse { metadata, body: bytes.to_vec() });
		}

		Err(classify::classify_response(method.as_str(), path, metadata, &bytes))
	}

	fn request_url(&self, path: &str) -> Result<Url> {
		self.config.base_url.join(path).map_err(|source| {
			ConfigError::InvalidPath { path: path.to_owned(), source }.into()
		})
	}
}

fn bearer_header(token: &str, method: &Method, path: &str) -> Result<HeaderValue> {
	match HeaderValue::from_str(&format!("Bearer {token}")) {
		Ok(mut value) => {
			value.set_sensitive(true);

			Ok(value)
		},
		Err(_) => Err(ApiError::new(
			ErrorKind::Auth,
			method.as_str(),
			path,
			"Access token cannot be encoded as an Authorization header value",
		)
		.into()),
	}
}

fn network_error(
	method: &Method,
	path: &str,
	elapsed: StdDuration,
	source: &reqwest::Error,
) -> ApiError {
	ApiError::new(
		ErrorKind::Transient,
		method.as_str(),
		path,
		format!("Network error occurred while calling the endpoint: {source}"),
	)
	.with_metadata(ResponseMetadata::unanswered(elapsed))
}

/// Computes the wait before retry `attempt`, honoring `Retry-After` within policy bounds.
fn retry_delay(policy: &RetryPolicy, attempt: u32, retry_after: Option<Duration>) -> Duration {
	if let Some(hint) = retry_after {
		return hint.clamp(policy.min_wait, policy.max_wait);
	}

	let doubling = 2_i32.saturating_pow(attempt.min(16));
	let base = policy.min_wait.saturating_mul(doubling);
	let capped = if base > policy.max_wait { policy.max_wait } else { base };

	jittered(capped)
}

/// Applies half-interval jitter so synchronized clients spread their retries.
fn jittered(delay: Duration) -> Duration {
	let millis = delay.whole_milliseconds();

	if millis <= 1 {
		return delay;
	}

	let half = (millis / 2) as i64;
	let jitter = rand::rng().random_range(0..=half);

	Duration::milliseconds(half + jitter)
}

fn to_std(delay: Duration) -> StdDuration {
	delay.try_into().unwrap_or(StdDuration::ZERO)
}
