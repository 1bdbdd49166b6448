//! Two-tier method-result cache (§4.2, §3 CacheKey/CacheEntry).

pub mod store;

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

pub use store::{InMemorySharedStore, SharedCounterStore};

const DEFAULT_INTERNAL_CAPACITY: usize = 4_096;

/// Fields masked wherever a cache key might otherwise leak them into logs.
const SENSITIVE_KEY_FRAGMENTS: &[&str] = &["operator_key", "private_key", "apikey", "api_key"];

/// `method` joined with a canonical serialization of its non-context
/// arguments — see §3 CacheKey. Two semantically equal argument lists
/// always produce the same key because `serde_json::Value` objects
/// serialize their keys in sorted order once parsed from a `Map`
/// constructed with `preserve_order` disabled (the crate default).
pub fn cache_key(method: &str, args: &[Value]) -> String {
    let canonical = serde_json::to_string(args).unwrap_or_default();
    format!("{method}:{canonical}")
}

/// Replaces any sensitive substring in a cache key with `***` before it is
/// ever written to a log line.
pub fn mask_key_for_log(key: &str) -> String {
    let mut masked = key.to_string();
    for fragment in SENSITIVE_KEY_FRAGMENTS {
        if masked.to_lowercase().contains(fragment) {
            masked = format!("{fragment}:***");
            break;
        }
    }
    masked
}

#[derive(Clone)]
struct InternalEntry {
    value: Value,
    expires_at: Instant,
}

/// `get`/`set`/`delete`/`clear` over an in-process LRU tier plus an
/// optional shared tier. A shared-tier hit populates the internal tier
/// with whatever TTL remains; writes go to both tiers (§4.2).
pub struct CacheService {
    internal: Mutex<LruCache<String, InternalEntry>>,
    shared: Option<Arc<dyn SharedCounterStore>>,
    default_ttl: Duration,
}

impl CacheService {
    pub fn new(default_ttl: Duration, shared: Option<Arc<dyn SharedCounterStore>>) -> Self {
        Self {
            internal: Mutex::new(LruCache::new(
                NonZeroUsize::new(DEFAULT_INTERNAL_CAPACITY).expect("nonzero capacity"),
            )),
            shared,
            default_ttl,
        }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        {
            let mut internal = self.internal.lock().expect("cache mutex poisoned");
            if let Some(entry) = internal.get(key) {
                if entry.expires_at > now {
                    trace!(key = %mask_key_for_log(key), tier = "internal", "cache hit");
                    return Some(entry.value.clone());
                }
                internal.pop(key);
            }
        }

        let shared = self.shared.as_ref()?;
        let (raw, remaining_ttl) = shared.get_value(key).await?;
        let value: Value = serde_json::from_slice(&raw).ok()?;
        trace!(key = %mask_key_for_log(key), tier = "shared", "cache hit");
        self.store_internal(key, value.clone(), remaining_ttl.unwrap_or(self.default_ttl));
        Some(value)
    }

    pub async fn set(&self, key: &str, value: &impl Serialize, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(_) => return,
        };
        self.store_internal(key, value.clone(), ttl);
        if let Some(shared) = &self.shared {
            if let Ok(bytes) = serde_json::to_vec(&value) {
                shared.set_value(key, bytes, Some(ttl)).await;
            }
        }
        trace!(key = %mask_key_for_log(key), ?ttl, "cache set");
    }

    fn store_internal(&self, key: &str, value: Value, ttl: Duration) {
        let mut internal = self.internal.lock().expect("cache mutex poisoned");
        internal.put(
            key.to_string(),
            InternalEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub async fn delete(&self, key: &str) {
        {
            let mut internal = self.internal.lock().expect("cache mutex poisoned");
            internal.pop(key);
        }
        if let Some(shared) = &self.shared {
            shared.delete(key).await;
        }
    }

    /// Drops every key matching `prefix`, or every key when `prefix` is `None`.
    pub async fn clear(&self, prefix: Option<&str>) {
        {
            let mut internal = self.internal.lock().expect("cache mutex poisoned");
            match prefix {
                Some(prefix) => {
                    let stale: Vec<String> = internal
                        .iter()
                        .filter(|(key, _)| key.starts_with(prefix))
                        .map(|(key, _)| key.clone())
                        .collect();
                    for key in stale {
                        internal.pop(&key);
                    }
                }
                None => internal.clear(),
            }
        }
        if let Some(shared) = &self.shared {
            shared.clear_prefix(prefix.unwrap_or("")).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = CacheService::new(Duration::from_secs(60), None);
        let key = cache_key("eth_chainId", &[]);
        cache.set(&key, &serde_json::json!("0x127"), None).await;
        assert_eq!(cache.get(&key).await, Some(serde_json::json!("0x127")));
    }

    #[tokio::test]
    async fn expired_entry_is_not_returned() {
        let cache = CacheService::new(Duration::from_millis(5), None);
        let key = cache_key("eth_blockNumber", &[]);
        cache.set(&key, &serde_json::json!("0x1"), None).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get(&key).await, None);
    }

    #[tokio::test]
    async fn shared_hit_populates_internal_tier() {
        let shared = Arc::new(InMemorySharedStore::new());
        shared
            .set_value("k", serde_json::to_vec(&serde_json::json!(42)).unwrap(), None)
            .await;
        let cache = CacheService::new(Duration::from_secs(60), Some(shared.clone()));
        assert_eq!(cache.get("k").await, Some(serde_json::json!(42)));
        // Now even with the shared store wiped, the internal tier still has it.
        shared.delete("k").await;
        assert_eq!(cache.get("k").await, Some(serde_json::json!(42)));
    }

    #[tokio::test]
    async fn shared_hit_repopulates_internal_with_remaining_ttl_not_default() {
        let shared = Arc::new(InMemorySharedStore::new());
        shared
            .set_value("k", serde_json::to_vec(&serde_json::json!(42)).unwrap(), Some(Duration::from_millis(20)))
            .await;
        // default_ttl is deliberately much longer than the shared entry's TTL.
        let cache = CacheService::new(Duration::from_secs(60), Some(shared.clone()));
        assert_eq!(cache.get("k").await, Some(serde_json::json!(42)));
        shared.delete("k").await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        // Internal tier should have inherited the short remaining TTL, not default_ttl.
        assert_eq!(cache.get("k").await, None);
    }

    #[test]
    fn sensitive_fragment_is_masked() {
        let key = "config:operator_key:0xabc";
        assert_eq!(mask_key_for_log(key), "operator_key:***");
    }
}
