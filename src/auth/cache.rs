//! Validation result cache.
//!
//! Only successful validations are stored, keyed by a SHA-256 digest of the
//! token so raw tokens never sit in memory longer than the request. An entry
//! is never served at or after the token's `exp`.

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::auth::claims::ClaimsSet;
use crate::auth::token::ValidToken;

#[derive(Debug, Clone)]
struct CachedToken {
    claims: ClaimsSet,
    expires_at: u64,
}

/// Bounded map from token digest to verified claims.
#[derive(Debug)]
pub struct ValidationCache {
    entries: DashMap<String, CachedToken>,
    max_entries: usize,
}

impl ValidationCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
        }
    }

    fn key(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }

    /// Cached result for `token`, if still within its lifetime at `now`.
    pub fn get(&self, token: &str, now: u64) -> Option<ValidToken> {
        let key = Self::key(token);
        let hit = self.entries.get(&key).map(|entry| {
            let fresh = now < entry.expires_at;
            (fresh, entry.claims.clone(), entry.expires_at)
        });
        // The read guard is dropped here; removing while holding it deadlocks.
        match hit {
            Some((true, claims, expires_at)) => Some(ValidToken { claims, expires_at }),
            Some((false, _, _)) => {
                self.entries.remove_if(&key, |_, entry| now >= entry.expires_at);
                None
            }
            None => None,
        }
    }

    /// Store a successful validation. Skipped when the token is already at
    /// its expiry or the cache stays full after purging.
    pub fn insert(&self, token: &str, valid: &ValidToken, now: u64) {
        if now >= valid.expires_at || self.max_entries == 0 {
            return;
        }
        if self.entries.len() >= self.max_entries {
            self.purge_expired(now);
            if self.entries.len() >= self.max_entries {
                tracing::debug!(entries = self.entries.len(), "Validation cache full, not caching");
                return;
            }
        }
        self.entries.insert(
            Self::key(token),
            CachedToken {
                claims: valid.claims.clone(),
                expires_at: valid.expires_at,
            },
        );
    }

    /// Drop every entry whose token expired at or before `now`.
    pub fn purge_expired(&self, now: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn valid(expires_at: u64) -> ValidToken {
        let mut claims = Map::new();
        claims.insert("sub".into(), "user".into());
        ValidToken {
            claims: ClaimsSet::new("Bearer", claims),
            expires_at,
        }
    }

    #[test]
    fn test_hit_before_expiry() {
        let cache = ValidationCache::new(10);
        cache.insert("tok", &valid(100), 50);
        let hit = cache.get("tok", 99).unwrap();
        assert_eq!(hit.expires_at, 100);
        assert_eq!(hit.claims.subject(), Some("user"));
        assert!(cache.get("other", 50).is_none());
    }

    #[test]
    fn test_never_served_at_or_after_expiry() {
        let cache = ValidationCache::new(10);
        cache.insert("tok", &valid(100), 50);
        assert!(cache.get("tok", 100).is_none());
        assert!(cache.is_empty());

        cache.insert("late", &valid(100), 100);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_full_cache_purges_then_skips() {
        let cache = ValidationCache::new(2);
        cache.insert("a", &valid(10), 0);
        cache.insert("b", &valid(100), 0);

        // "a" has expired by now=20 and makes room.
        cache.insert("c", &valid(100), 20);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("c", 20).is_some());

        cache.insert("d", &valid(100), 20);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("d", 20).is_none());
    }

    #[test]
    fn test_keys_are_digests() {
        let cache = ValidationCache::new(10);
        cache.insert("secret-token", &valid(100), 0);
        assert!(cache.entries.iter().all(|e| !e.key().contains("secret")));
        assert_eq!(ValidationCache::key("x").len(), 64);
    }
}
