//! Session cache with TTL expiration and bounded size.
//!
//! Adapters that must log in to their backing system share sessions
//! through a [`SessionCache`] passed in at construction time. Keys are
//! SHA-256 digests of the login material, so plaintext credentials never
//! sit in the map.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::debug;

use lagscale_core::Credentials;

/// Opaque session handle returned by a backing system's login.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// Cache key for a set of credentials against one endpoint.
pub fn session_key(endpoint: &str, credentials: &Credentials) -> String {
    let mut hasher = Sha256::new();
    hasher.update(endpoint.as_bytes());
    hasher.update([0u8]);
    hasher.update(credentials.username.as_bytes());
    hasher.update([0u8]);
    hasher.update(credentials.password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Storage for session tokens shared between adapter instances.
pub trait SessionCache: Send + Sync {
    fn get(&self, key: &str) -> Option<SessionToken>;
    fn set(&self, key: &str, token: SessionToken);
    fn remove(&self, key: &str);
}

/// Configuration for [`TtlSessionCache`].
#[derive(Clone, Debug)]
pub struct SessionCacheConfig {
    /// Time-to-live for cached sessions (default: 5 minutes).
    pub ttl: Duration,
    /// Maximum number of cached sessions (default: 256).
    pub max_entries: usize,
}

impl Default for SessionCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 256,
        }
    }
}

struct CacheEntry {
    token: SessionToken,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }
}

/// In-process session cache. Expired entries are removed on access; when
/// full, the oldest entry is evicted.
pub struct TtlSessionCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    config: SessionCacheConfig,
}

impl TtlSessionCache {
    pub fn new(config: SessionCacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TtlSessionCache {
    fn default() -> Self {
        Self::new(SessionCacheConfig::default())
    }
}

impl SessionCache for TtlSessionCache {
    fn get(&self, key: &str) -> Option<SessionToken> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = entries.get(key)?.is_expired(self.config.ttl);
        if expired {
            entries.remove(key);
            debug!("session cache miss (expired)");
            return None;
        }
        entries.get(key).map(|e| e.token.clone())
    }

    fn set(&self, key: &str, token: SessionToken) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if !entries.contains_key(key) && entries.len() >= self.config.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                debug!(max_entries = self.config.max_entries, "session cache evicted oldest entry");
            }
        }
        entries.insert(
            key.to_string(),
            CacheEntry {
                token,
                inserted_at: Instant::now(),
            },
        );
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(user: &str, pass: &str) -> Credentials {
        Credentials {
            username: user.to_string(),
            password: pass.to_string(),
        }
    }

    #[test]
    fn set_then_get() {
        let cache = TtlSessionCache::default();
        cache.set("k", SessionToken::new("t1"));
        assert_eq!(cache.get("k"), Some(SessionToken::new("t1")));
        assert_eq!(cache.get("other"), None);
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = TtlSessionCache::new(SessionCacheConfig {
            ttl: Duration::ZERO,
            max_entries: 4,
        });
        cache.set("k", SessionToken::new("t1"));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn full_cache_evicts_oldest() {
        let cache = TtlSessionCache::new(SessionCacheConfig {
            ttl: Duration::from_secs(60),
            max_entries: 2,
        });
        cache.set("a", SessionToken::new("1"));
        std::thread::sleep(Duration::from_millis(2));
        cache.set("b", SessionToken::new("2"));
        std::thread::sleep(Duration::from_millis(2));
        cache.set("c", SessionToken::new("3"));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn overwrite_does_not_evict() {
        let cache = TtlSessionCache::new(SessionCacheConfig {
            ttl: Duration::from_secs(60),
            max_entries: 1,
        });
        cache.set("a", SessionToken::new("1"));
        cache.set("a", SessionToken::new("2"));
        assert_eq!(cache.get("a"), Some(SessionToken::new("2")));
    }

    #[test]
    fn keys_are_hashed_and_distinct() {
        let k1 = session_key("orders", &creds("iggy", "secret"));
        let k2 = session_key("orders", &creds("iggy", "other"));
        let k3 = session_key("billing", &creds("iggy", "secret"));
        assert_eq!(k1.len(), 64);
        assert!(!k1.contains("secret"));
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
        assert_eq!(k1, session_key("orders", &creds("iggy", "secret")));
    }

    #[test]
    fn token_debug_is_redacted() {
        let t = SessionToken::new("very-secret");
        assert_eq!(format!("{t:?}"), "SessionToken(..)");
    }
}
