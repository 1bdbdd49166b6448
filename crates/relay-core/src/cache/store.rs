use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Anything that can back the shared tier of the cache, the rate-limit
/// store, and the HBAR spending plans with the same atomicity guarantee:
/// increment, compare, and (on first increment) TTL establishment happen
/// as one step from the caller's perspective (§4.3).
///
/// A production deployment plugs a real networked store in behind this
/// trait; [`InMemorySharedStore`] emulates the guarantee with a mutex so
/// the rest of the crate can be built and tested without one.
#[async_trait]
pub trait SharedCounterStore: Send + Sync {
    /// Increments `key` by one, setting its TTL to `window` only on the
    /// transition from absent to `1`. Returns the counter value after the
    /// increment.
    async fn increment_and_check(&self, key: &str, window: Duration) -> u64;

    /// Returns the stored bytes along with the time remaining until expiry,
    /// or `None` if the key carries no TTL (lives until explicitly deleted).
    async fn get_value(&self, key: &str) -> Option<(Vec<u8>, Option<Duration>)>;
    async fn set_value(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>);
    async fn delete(&self, key: &str);
    async fn clear_prefix(&self, prefix: &str);
}

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

/// Reference `SharedCounterStore` used when no networked store is
/// configured; also doubles as the shared cache tier in tests.
#[derive(Default)]
pub struct InMemorySharedStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemorySharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_live(entry: &Entry, now: Instant) -> bool {
        entry.expires_at.map(|expiry| expiry > now).unwrap_or(true)
    }
}

#[async_trait]
impl SharedCounterStore for InMemorySharedStore {
    async fn increment_and_check(&self, key: &str, window: Duration) -> u64 {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("shared store mutex poisoned");
        let live = entries
            .get(key)
            .map(|entry| Self::is_live(entry, now))
            .unwrap_or(false);

        if !live {
            entries.insert(
                key.to_string(),
                Entry {
                    value: 1u64.to_be_bytes().to_vec(),
                    expires_at: Some(now + window),
                },
            );
            return 1;
        }

        let entry = entries.get_mut(key).expect("checked live above");
        let current = u64::from_be_bytes(
            entry
                .value
                .as_slice()
                .try_into()
                .unwrap_or([0u8; 8]),
        );
        let next = current + 1;
        entry.value = next.to_be_bytes().to_vec();
        next
    }

    async fn get_value(&self, key: &str) -> Option<(Vec<u8>, Option<Duration>)> {
        let now = Instant::now();
        let entries = self.entries.lock().expect("shared store mutex poisoned");
        entries.get(key).and_then(|entry| {
            if Self::is_live(entry, now) {
                let remaining = entry.expires_at.map(|expiry| expiry.saturating_duration_since(now));
                Some((entry.value.clone(), remaining))
            } else {
                None
            }
        })
    }

    async fn set_value(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        let mut entries = self.entries.lock().expect("shared store mutex poisoned");
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
    }

    async fn delete(&self, key: &str) {
        let mut entries = self.entries.lock().expect("shared store mutex poisoned");
        entries.remove(key);
    }

    async fn clear_prefix(&self, prefix: &str) {
        let mut entries = self.entries.lock().expect("shared store mutex poisoned");
        entries.retain(|key, _| !key.starts_with(prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn increment_resets_after_window() {
        let store = InMemorySharedStore::new();
        assert_eq!(store.increment_and_check("k", Duration::from_millis(20)).await, 1);
        assert_eq!(store.increment_and_check("k", Duration::from_millis(20)).await, 2);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.increment_and_check("k", Duration::from_millis(20)).await, 1);
    }

    #[tokio::test]
    async fn clear_prefix_removes_matching_keys() {
        let store = InMemorySharedStore::new();
        store.set_value("a:1", vec![1], None).await;
        store.set_value("a:2", vec![2], None).await;
        store.set_value("b:1", vec![3], None).await;
        store.clear_prefix("a:").await;
        assert!(store.get_value("a:1").await.is_none());
        assert!(store.get_value("b:1").await.is_some());
    }

    #[tokio::test]
    async fn get_value_reports_remaining_ttl() {
        let store = InMemorySharedStore::new();
        store.set_value("k", vec![1], Some(Duration::from_secs(60))).await;
        let (_, remaining) = store.get_value("k").await.unwrap();
        assert!(remaining.unwrap() <= Duration::from_secs(60));
        store.set_value("untimed", vec![2], None).await;
        let (_, remaining) = store.get_value("untimed").await.unwrap();
        assert!(remaining.is_none());
    }
}
