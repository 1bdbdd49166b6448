//! Per-IP, per-method rate limiting (§4.3, §3 RateLimitKey).

use std::sync::Arc;
use std::time::Duration;

use crate::cache::SharedCounterStore;

/// `ratelimit:{ip}:{method}` — see §3 RateLimitKey.
pub fn rate_limit_key(ip: &str, method: &str) -> String {
    format!("ratelimit:{ip}:{method}")
}

/// Wraps a [`SharedCounterStore`] with the method-limit lookup the
/// dispatcher's rate-limit decorator consults (§4.1).
pub struct RateLimitService {
    store: Arc<dyn SharedCounterStore>,
}

impl RateLimitService {
    pub fn new(store: Arc<dyn SharedCounterStore>) -> Self {
        Self { store }
    }

    /// Increments the counter for `(ip, method)` and reports whether the
    /// caller has now exceeded `limit` within `window`. The increment
    /// always happens — there's no way to "peek" without counting — so
    /// this must only be called once per request per decorated method.
    pub async fn increment_and_check(
        &self,
        ip: &str,
        method: &str,
        limit: u64,
        window: Duration,
    ) -> bool {
        let key = rate_limit_key(ip, method);
        let count = self.store.increment_and_check(&key, window).await;
        count > limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemorySharedStore;

    #[tokio::test]
    async fn exceeding_limit_reports_true_from_the_n_plus_one_call() {
        let service = RateLimitService::new(Arc::new(InMemorySharedStore::new()));
        let window = Duration::from_secs(60);
        for _ in 0..5 {
            assert!(!service.increment_and_check("1.2.3.4", "eth_call", 5, window).await);
        }
        assert!(service.increment_and_check("1.2.3.4", "eth_call", 5, window).await);
    }

    #[tokio::test]
    async fn different_methods_have_independent_counters() {
        let service = RateLimitService::new(Arc::new(InMemorySharedStore::new()));
        let window = Duration::from_secs(60);
        for _ in 0..5 {
            service.increment_and_check("1.2.3.4", "eth_call", 5, window).await;
        }
        assert!(!service
            .increment_and_check("1.2.3.4", "eth_blockNumber", 5, window)
            .await);
    }
}
