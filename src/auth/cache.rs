//! Single-slot token cache with a singleflight guard for concurrent refreshes.

// self
use crate::{_prelude::*, auth::AccessToken};

/// Thread-safe holder for the client's current bearer token.
///
/// Readers check the slot without waiting; writers serialize on [`TokenCache::guard`] so only
/// one password grant runs at a time and late arrivals reuse the token it stored.
#[derive(Debug, Default)]
pub struct TokenCache {
	slot: RwLock<Option<AccessToken>>,
	singleflight: AsyncMutex<()>,
}
impl TokenCache {
	/// Returns the cached token when it is still usable at `now`.
	pub fn current(&self, now: OffsetDateTime, window: Duration) -> Option<AccessToken> {
		self.slot.read().as_ref().filter(|token| !token.needs_refresh(now, window)).cloned()
	}

	/// Returns the cached token regardless of freshness.
	pub fn peek(&self) -> Option<AccessToken> {
		self.slot.read().clone()
	}

	/// Replaces the cached token.
	pub fn store(&self, token: AccessToken) {
		*self.slot.write() = Some(token);
	}

	/// Drops the cached token, returning it if one was present.
	pub fn clear(&self) -> Option<AccessToken> {
		self.slot.write().take()
	}

	/// Drops the cached token only if it still carries `bearer`.
	///
	/// A request that fails with a stale token must not evict a fresher token another task
	/// stored in the meantime.
	pub fn clear_if_matches(&self, bearer: &str) -> bool {
		let mut guard = self.slot.write();

		match guard.as_ref() {
			Some(token) if token.access_token.expose() == bearer => {
				*guard = None;

				true
			},
			_ => false,
		}
	}

	/// Waits for exclusive permission to fetch a new token.
	pub async fn guard(&self) -> async_lock::MutexGuard<'_, ()> {
		self.singleflight.lock().await
	}
}
