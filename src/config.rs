//! Client configuration surface and validation.
//!
//! All values are passed in by the caller; this layer has no environment-variable coupling.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, auth::manager::DEFAULT_REFRESH_SKEW, error::ConfigError};

/// Default Jamf Protect API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.protect.jamfcloud.com";
/// Default GraphQL endpoint path appended to the base URL.
pub const DEFAULT_GRAPHQL_PATH: &str = "/graphql";
/// Fixed User-Agent prefix attached to every outbound call.
pub const USER_AGENT: &str = concat!("jamf-protect-client/", env!("CARGO_PKG_VERSION"));

/// Bounded exponential backoff policy applied to retryable failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Maximum retry attempts after the initial call.
	pub max_retries: u32,
	/// Base wait before the first retry.
	pub min_wait: Duration,
	/// Upper bound for any single wait, including `Retry-After` hints.
	pub max_wait: Duration,
}
impl RetryPolicy {
	/// Disables retries entirely.
	pub const fn none() -> Self {
		Self { max_retries: 0, min_wait: Duration::ZERO, max_wait: Duration::ZERO }
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self { max_retries: 3, min_wait: Duration::seconds(1), max_wait: Duration::seconds(30) }
	}
}

/// Validated configuration consumed by the transport.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// API base URL all request paths are joined onto.
	pub base_url: Url,
	/// Path of the GraphQL endpoint relative to the base URL.
	pub graphql_path: String,
	/// Per-request timeout applied by the provisioned HTTP client.
	pub timeout: StdDuration,
	/// Retry policy for retryable failures.
	pub retry: RetryPolicy,
	/// Safety margin subtracted from token lifetimes to force early renewal.
	pub refresh_skew: Duration,
	/// Optional suffix appended to the fixed User-Agent string.
	pub user_agent_extension: Option<String>,
}
impl ClientConfig {
	/// Returns a builder seeded with the crate defaults.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder::new()
	}

	/// Full User-Agent string, including the configured extension.
	pub fn user_agent(&self) -> String {
		match &self.user_agent_extension {
			Some(extension) => format!("{USER_AGENT} {extension}"),
			None => USER_AGENT.to_owned(),
		}
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Clone, Debug)]
pub struct ClientConfigBuilder {
	base_url: Option<Url>,
	graphql_path: String,
	timeout: StdDuration,
	retry: RetryPolicy,
	refresh_skew: Duration,
	user_agent_extension: Option<String>,
}
impl ClientConfigBuilder {
	fn new() -> Self {
		Self {
			base_url: None,
			graphql_path: DEFAULT_GRAPHQL_PATH.into(),
			timeout: StdDuration::from_secs(60),
			retry: RetryPolicy::default(),
			refresh_skew: DEFAULT_REFRESH_SKEW,
			user_agent_extension: None,
		}
	}

	/// Overrides the base URL (defaults to [`DEFAULT_BASE_URL`]).
	pub fn base_url(mut self, url: Url) -> Self {
		self.base_url = Some(url);

		self
	}

	/// Overrides the GraphQL endpoint path.
	pub fn graphql_path(mut self, path: impl Into<String>) -> Self {
		self.graphql_path = path.into();

		self
	}

	/// Overrides the per-request timeout (defaults to 60 seconds).
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the retry policy.
	pub fn retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Overrides the refresh skew (defaults to 60 seconds).
	pub fn refresh_skew(mut self, skew: Duration) -> Self {
		self.refresh_skew = skew;

		self
	}

	/// Appends an extension to the fixed User-Agent string.
	pub fn user_agent_extension(mut self, extension: impl Into<String>) -> Self {
		self.user_agent_extension = Some(extension.into());

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let base_url = match self.base_url {
			Some(url) => url,
			None => Url::parse(DEFAULT_BASE_URL).map_err(|source| ConfigError::InvalidBaseUrl {
				url: DEFAULT_BASE_URL.into(),
				source,
			})?,
		};

		if base_url.scheme() != "https" {
			return Err(ConfigError::InsecureEndpoint {
				endpoint: "base",
				url: base_url.to_string(),
			});
		}
		if self.timeout.is_zero() {
			return Err(ConfigError::NonPositiveTimeout);
		}
		if self.retry.min_wait.is_negative() || self.retry.min_wait > self.retry.max_wait {
			return Err(ConfigError::InvalidRetryBounds);
		}
		if self.refresh_skew.is_negative() {
			return Err(ConfigError::NegativeRefreshSkew);
		}

		Ok(ClientConfig {
			base_url,
			graphql_path: self.graphql_path,
			timeout: self.timeout,
			retry: self.retry,
			refresh_skew: self.refresh_skew,
			user_agent_extension: self.user_agent_extension,
		})
	}
}
