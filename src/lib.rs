//! Rust client core for the Jamf Protect API—cached bearer tokens with coalesced refresh, a
//! retrying transport, and typed error classification in one crate built for production.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod classify;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod transport;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::Credentials,
		config::{ClientConfig, RetryPolicy},
		transport::Transport,
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_http_client() -> ReqwestClient {
		ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.")
	}

	/// Parses a URL fixture, panicking with context on failure.
	pub fn test_url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse test URL fixture.")
	}

	/// Credentials fixture pointing at the provided token endpoint.
	pub fn test_credentials(token_url: &str) -> Credentials {
		Credentials::new("test-client", "test-password", test_url(token_url))
			.expect("Failed to build test credentials.")
	}

	/// Configuration fixture with retry waits short enough for mock servers.
	pub fn test_config(base_url: &str) -> ClientConfig {
		ClientConfig::builder()
			.base_url(test_url(base_url))
			.retry(RetryPolicy {
				max_retries: 2,
				min_wait: Duration::milliseconds(10),
				max_wait: Duration::milliseconds(40),
			})
			.build()
			.expect("Failed to build test configuration.")
	}

	/// Constructs a [`Transport`] wired to the insecure test client and fast retries.
	pub fn build_test_transport(base_url: &str) -> Transport {
		Transport::with_http_client(
			test_config(base_url),
			test_credentials(&format!("{base_url}/token")),
			test_http_client(),
		)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::Client as ReqwestClient;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, jamf_protect_client as _};
