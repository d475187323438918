//! Immutable client credential triple validated at construction time.

// self
use crate::{_prelude::*, auth::secret::TokenSecret, error::ConfigError};

/// Client-id/password/token-URL triple used for every token exchange.
///
/// Validation happens exactly once, in [`Credentials::new`]; instances are immutable
/// afterwards. An invalid triple is a fatal configuration error surfaced before any network
/// activity takes place.
#[derive(Clone)]
pub struct Credentials {
	client_id: String,
	password: TokenSecret,
	token_url: Url,
}
impl Credentials {
	/// Validates and builds a credential set.
	///
	/// The client identifier and password must be non-empty and the token URL must use HTTPS.
	pub fn new(
		client_id: impl Into<String>,
		password: impl Into<String>,
		token_url: Url,
	) -> Result<Self, ConfigError> {
		let client_id = client_id.into();
		let password = password.into();

		if client_id.trim().is_empty() {
			return Err(ConfigError::EmptyCredentialField { field: "client_id" });
		}
		if password.trim().is_empty() {
			return Err(ConfigError::EmptyCredentialField { field: "password" });
		}
		if token_url.scheme() != "https" {
			return Err(ConfigError::InsecureEndpoint {
				endpoint: "token",
				url: token_url.to_string(),
			});
		}

		Ok(Self { client_id, password: TokenSecret::new(password), token_url })
	}

	/// Returns the client identifier.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// Returns the redacted password secret.
	pub fn password(&self) -> &TokenSecret {
		&self.password
	}

	/// Returns the token endpoint URL.
	pub fn token_url(&self) -> &Url {
		&self.token_url
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("client_id", &self.client_id)
			.field("password", &TokenSecret::REDACTED)
			.field("token_url", &self.token_url.as_str())
			.finish()
	}
}
