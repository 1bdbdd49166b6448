//! §8 scenario 4: rate limiting is enforced against the shared counter store,
//! not per-process state, so two relay replicas sharing one store agree on
//! when a caller has exceeded its limit.

use std::sync::Arc;
use std::time::Duration;

use relay_core::cache::InMemorySharedStore;
use relay_core::rate_limit::RateLimitService;

#[tokio::test]
async fn two_replicas_share_one_limit_and_it_resets_after_the_window() {
    let store = Arc::new(InMemorySharedStore::new());
    let replica_a = RateLimitService::new(store.clone());
    let replica_b = RateLimitService::new(store);

    let limit = 5;
    let window = Duration::from_millis(200);

    for i in 0..5 {
        let replica = if i % 2 == 0 { &replica_a } else { &replica_b };
        assert!(
            !replica.increment_and_check("1.2.3.4", "eth_call", limit, window).await,
            "call {i} is within the shared limit"
        );
    }

    assert!(
        replica_a.increment_and_check("1.2.3.4", "eth_call", limit, window).await,
        "the 6th call across both replicas must be refused"
    );

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert!(
        !replica_b.increment_and_check("1.2.3.4", "eth_call", limit, window).await,
        "the counter resets once the window elapses"
    );
}
