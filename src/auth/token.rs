//! Cached bearer token entry plus freshness helpers.

// self
use crate::{_prelude::*, auth::secret::TokenSecret};

/// A single cached bearer token with its absolute expiry instant.
///
/// Created by a successful token exchange, read by every [`crate::auth::TokenManager::token`]
/// call, and replaced wholesale by the next refresh. Replacement is atomic from the
/// perspective of concurrent readers: the manager swaps the entire value under its cache lock
/// and never updates fields in place.
#[derive(Clone, Serialize, Deserialize)]
pub struct CachedToken {
	/// Bearer token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Token type reported by the identity endpoint, normally `Bearer`.
	pub token_type: String,
	/// Instant the token was obtained.
	pub issued_at: OffsetDateTime,
	/// Absolute expiry instant derived from `issued_at + expires_in`.
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Returns `true` once the expiry instant has been reached.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Returns `true` while `instant + skew` stays short of the expiry instant.
	///
	/// A fresh token is guaranteed to outlive the skew margin, so no caller ever presents a
	/// token within that margin of literal expiry.
	pub fn is_fresh_at(&self, instant: OffsetDateTime, skew: Duration) -> bool {
		instant + skew < self.expires_at
	}

	/// Remaining lifetime at the provided instant; negative once expired.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		self.expires_at - instant
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("access_token", &TokenSecret::REDACTED)
			.field("token_type", &self.token_type)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
