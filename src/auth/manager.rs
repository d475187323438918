//! Token caching and coalesced refresh coordination.
//!
//! The manager owns the only mutable shared state in the crate: one cached bearer token per
//! client instance, modeled as an owned object rather than global state so independent
//! clients (and tests) never share tokens. Reads take a short `RwLock` read guard, keeping
//! the common case concurrent; refreshes funnel through an async gate so at most one
//! exchange is in flight regardless of caller count. Callers that arrive while a refresh is
//! in flight adopt the outcome of that refresh (the same token or the same error) instead
//! of issuing their own exchange.

// self
use crate::{
	_prelude::*,
	auth::{fetcher::TokenFetcher, token::CachedToken},
	error::ApiError,
};

/// Default safety margin subtracted from a token's reported lifetime.
pub const DEFAULT_REFRESH_SKEW: Duration = Duration::seconds(60);

#[derive(Debug, Default)]
struct RefreshCycle {
	generation: u64,
	outcome: Option<Result<CachedToken, ApiError>>,
}

#[derive(Debug)]
struct TokenState {
	cached: RwLock<Option<CachedToken>>,
	cycle: Mutex<RefreshCycle>,
	gate: AsyncMutex<()>,
}

/// Owns the cached token and guarantees single-flight refreshes.
///
/// Cloning shares the underlying state deliberately: one transport owns one manager owns one
/// credential set. Construct separate managers for independent token streams.
#[derive(Clone, Debug)]
pub struct TokenManager {
	fetcher: TokenFetcher,
	refresh_skew: Duration,
	state: Arc<TokenState>,
}
impl TokenManager {
	/// Creates a manager around the provided fetcher with [`DEFAULT_REFRESH_SKEW`].
	pub fn new(fetcher: TokenFetcher) -> Self {
		Self::with_refresh_skew(fetcher, DEFAULT_REFRESH_SKEW)
	}

	/// Creates a manager with a custom refresh skew. Negative skews are clamped to zero.
	pub fn with_refresh_skew(fetcher: TokenFetcher, skew: Duration) -> Self {
		let refresh_skew = if skew.is_negative() { Duration::ZERO } else { skew };

		Self {
			fetcher,
			refresh_skew,
			state: Arc::new(TokenState {
				cached: RwLock::new(None),
				cycle: Mutex::new(RefreshCycle::default()),
				gate: AsyncMutex::new(()),
			}),
		}
	}

	/// Returns the configured refresh skew.
	pub fn refresh_skew(&self) -> Duration {
		self.refresh_skew
	}

	/// Returns a token guaranteed to outlive the refresh skew, refreshing when needed.
	///
	/// Failure policy: when a proactive refresh fails while the cached token has not
	/// literally expired, the stale-but-valid token is returned and the failure is logged;
	/// the error propagates only once no literally-valid token remains.
	pub async fn token(&self) -> Result<CachedToken, ApiError> {
		if let Some(current) = self.fresh_token() {
			return Ok(current);
		}

		match self.refresh_inner(false).await {
			Ok(token) => Ok(token),
			Err(err) => {
				let now = OffsetDateTime::now_utc();
				let stale =
					self.state.cached.read().clone().filter(|token| !token.is_expired_at(now));

				match stale {
					Some(current) => {
						#[cfg(feature = "tracing")]
						tracing::warn!(
							error = %err,
							expires_at = %current.expires_at,
							"Serving the cached token after a failed proactive refresh.",
						);

						Ok(current)
					},
					None => Err(err),
				}
			},
		}
	}

	/// Unconditionally obtains a new token, coalescing concurrent refreshers.
	///
	/// Callers that arrive while another refresh is in flight receive the outcome of that
	/// refresh rather than triggering a second exchange. A failed forced refresh never falls
	/// back to a stale entry; it clears the cache and propagates the error.
	pub async fn refresh(&self) -> Result<CachedToken, ApiError> {
		self.refresh_inner(true).await
	}

	/// Clears the cached token synchronously so the next [`TokenManager::token`] call is
	/// forced to refresh. Used after an observed 401 suggests the cached token was revoked
	/// server-side despite not being expired.
	pub fn invalidate(&self) {
		self.state.cached.write().take();
	}

	/// Returns the cached token without consulting the network, fresh or not.
	pub fn cached(&self) -> Option<CachedToken> {
		self.state.cached.read().clone()
	}

	fn fresh_token(&self) -> Option<CachedToken> {
		let now = OffsetDateTime::now_utc();

		self.state
			.cached
			.read()
			.clone()
			.filter(|token| token.is_fresh_at(now, self.refresh_skew))
	}

	async fn refresh_inner(&self, force: bool) -> Result<CachedToken, ApiError> {
		let observed = self.state.cycle.lock().generation;
		let _gate = self.state.gate.lock().await;

		// A refresh completed while this caller awaited the gate; adopt its outcome instead
		// of issuing another exchange.
		{
			let cycle = self.state.cycle.lock();

			if cycle.generation != observed
				&& let Some(outcome) = cycle.outcome.clone()
			{
				return outcome;
			}
		}

		if !force && let Some(current) = self.fresh_token() {
			return Ok(current);
		}

		let outcome = self.fetcher.fetch().await;

		match &outcome {
			Ok(token) => {
				*self.state.cached.write() = Some(token.clone());
			},
			Err(_) => {
				// Forced refreshes drop the entry outright; proactive ones only shed entries
				// that have actually expired so `token` can still serve the stale-valid one.
				let now = OffsetDateTime::now_utc();
				let mut cached = self.state.cached.write();

				if force || cached.as_ref().is_some_and(|token| token.is_expired_at(now)) {
					cached.take();
				}
			},
		}

		let mut cycle = self.state.cycle.lock();

		cycle.generation = cycle.generation.wrapping_add(1);
		cycle.outcome = Some(outcome.clone());

		outcome
	}
}
