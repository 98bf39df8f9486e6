//! Per-repository credential cache.

use super::{MintError, TokenMinter};
use crate::config::CredentialCacheConfig;
use crate::utils::{now_utc, Timestamp};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A minted repository credential.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedCredential {
    /// The secret token.
    pub token: String,
    /// Token kind, `bearer` unless the minting service says otherwise.
    pub token_kind: String,
    /// Expiry; `None` means usable until evicted.
    pub expires_at: Option<Timestamp>,
}

impl CachedCredential {
    /// Creates a credential.
    #[must_use]
    pub fn new(token: impl Into<String>, token_kind: impl Into<String>, expires_at: Option<Timestamp>) -> Self {
        Self {
            token: token.into(),
            token_kind: token_kind.into(),
            expires_at,
        }
    }

    /// Returns true while `now + buffer` is still before the expiry.
    ///
    /// A buffer reaching past the representable range never fits.
    #[must_use]
    pub fn is_usable_at(&self, now: Timestamp, buffer: chrono::Duration) -> bool {
        self.expires_at.map_or(true, |expires_at| {
            now.checked_add_signed(buffer)
                .is_some_and(|deadline| deadline < expires_at)
        })
    }
}

impl fmt::Debug for CachedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedCredential")
            .field("token", &"[REDACTED]")
            .field("token_kind", &self.token_kind)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

type CacheKey = (String, String);

/// Caches one credential per (owner, repository).
///
/// The map lock is never held across a mint call, so two concurrent misses
/// for the same key may both mint; the later store wins.
pub struct CredentialCache {
    minter: Arc<dyn TokenMinter>,
    enabled: bool,
    buffer: chrono::Duration,
    entries: Mutex<HashMap<CacheKey, CachedCredential>>,
}

impl CredentialCache {
    /// Creates a cache in front of `minter`.
    #[must_use]
    pub fn new(minter: Arc<dyn TokenMinter>, config: &CredentialCacheConfig) -> Self {
        let buffer = i64::try_from(config.buffer_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX);
        Self {
            minter,
            enabled: config.enabled,
            buffer,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a usable credential for `owner/repo`, minting when caching
    /// is disabled, `force_refresh` is set, or the cached one is missing or
    /// about to expire.
    ///
    /// # Errors
    ///
    /// Passes through the minter's `MintError` unchanged.
    pub async fn get(
        &self,
        owner: &str,
        repo: &str,
        force_refresh: bool,
    ) -> Result<CachedCredential, MintError> {
        let key = (owner.to_string(), repo.to_string());

        if self.enabled && !force_refresh {
            let mut entries = self.entries.lock();
            if let Some(cached) = entries.get(&key) {
                if cached.is_usable_at(now_utc(), self.buffer) {
                    tracing::debug!(owner, repo, "Credential cache hit");
                    return Ok(cached.clone());
                }
                tracing::info!(owner, repo, expires_at = ?cached.expires_at, "Cached credential expiring, refreshing");
                entries.remove(&key);
            }
        }

        let credential = self.minter.mint(owner, repo, force_refresh).await?;

        if self.enabled {
            self.entries.lock().insert(key, credential.clone());
        }

        Ok(credential)
    }

    /// Removes the entry for `owner/repo`, or every entry of `owner` when
    /// `repo` is `None`.
    pub fn evict(&self, owner: &str, repo: Option<&str>) {
        let mut entries = self.entries.lock();
        match repo {
            Some(repo) => {
                entries.remove(&(owner.to_string(), repo.to_string()));
            }
            None => entries.retain(|(o, _), _| o != owner),
        }
    }

    /// Removes every entry.
    pub fn evict_all(&self) {
        self.entries.lock().clear();
    }

    /// Number of cached credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCache")
            .field("enabled", &self.enabled)
            .field("buffer", &self.buffer)
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}
