//! The single shared context threaded through every dispatched call (§5
//! Shared-resource policy): one `RelayContext` bundles every process-wide
//! singleton so handlers take one reference instead of a handful.

use std::sync::Arc;
use std::time::Duration;

use ethereum_types::Address;
use tokio::sync::mpsc::UnboundedSender;

use crate::cache::{CacheService, InMemorySharedStore, SharedCounterStore};
use crate::config::RelayConfig;
use crate::filter::FilterService;
use crate::hbar_limit::HbarLimitService;
use crate::mirror_node::MirrorNodeClient;
use crate::rate_limit::RateLimitService;
use crate::sdk_client::{SdkClient, SdkEvent};
use crate::subscription::SubscriptionManager;

/// Derives the operator's long-zero EVM address from its Hedera account id
/// (`shard.realm.num`): 4 bytes of shard, 8 of realm, 8 of account num,
/// big-endian, zero-padded to 20 bytes — the standard Hedera EVM alias for
/// accounts that have not set an ECDSA-derived address.
pub fn long_zero_address(account_id: &str) -> Address {
    let mut parts = account_id.split('.');
    let (shard, realm, num) = match (parts.next(), parts.next(), parts.next()) {
        (Some(shard), Some(realm), Some(num)) => (
            shard.parse::<u32>().unwrap_or(0),
            realm.parse::<u64>().unwrap_or(0),
            num.parse::<u64>().unwrap_or(0),
        ),
        _ => (0, 0, 0),
    };
    let mut bytes = [0u8; 20];
    bytes[0..4].copy_from_slice(&shard.to_be_bytes());
    bytes[4..12].copy_from_slice(&realm.to_be_bytes());
    bytes[12..20].copy_from_slice(&num.to_be_bytes());
    Address::from(bytes)
}

pub struct RelayContext {
    pub config: RelayConfig,
    pub cache: Arc<CacheService>,
    pub rate_limit: Arc<RateLimitService>,
    pub hbar_limit: Arc<HbarLimitService>,
    pub mirror_node: Arc<MirrorNodeClient>,
    pub sdk_client: Arc<SdkClient>,
    pub filters: Arc<FilterService>,
    pub subscriptions: Arc<SubscriptionManager>,
    pub operator_address: Address,
}

impl RelayContext {
    /// Builds every process-wide singleton from `config`, wiring the shared
    /// store into the cache, rate-limit and HBAR services exactly as §5
    /// describes (all backed by the same `SharedCounterStore`).
    pub fn build(
        config: RelayConfig,
        mirror_node: MirrorNodeClient,
        operator_address: Address,
        operator_public_key: Option<String>,
        sdk_events: UnboundedSender<SdkEvent>,
        filter_reader: Arc<dyn crate::filter::FilterChainReader>,
        subscription_reader: Arc<dyn crate::subscription::SubscriptionChainReader>,
    ) -> Self {
        let shared_store: Arc<dyn SharedCounterStore> = Arc::new(InMemorySharedStore::new());
        let cache = Arc::new(CacheService::new(
            Duration::from_millis(config.cache_ttl_ms),
            config.ip_rate_limit_store_shared.then(|| shared_store.clone()),
        ));
        let rate_limit = Arc::new(RateLimitService::new(shared_store.clone()));
        let hbar_limit = Arc::new(HbarLimitService::new(shared_store.clone()));
        let mirror_node = Arc::new(mirror_node);
        let sdk_client = Arc::new(SdkClient::new(
            config.operator_id_main.clone().unwrap_or_default(),
            operator_public_key,
            sdk_events,
        ));
        let filters = Arc::new(FilterService::new(
            cache.clone(),
            filter_reader,
            config.filter_api_enabled,
        ));
        let subscriptions = Arc::new(SubscriptionManager::new(
            subscription_reader,
            config.max_subscriptions_per_connection as usize,
            Duration::from_millis(config.ws_polling_interval_ms),
        ));

        RelayContext {
            config,
            cache,
            rate_limit,
            hbar_limit,
            mirror_node,
            sdk_client,
            filters,
            subscriptions,
            operator_address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_zero_address_encodes_shard_realm_num() {
        let address = long_zero_address("0.0.1001");
        let mut expected = [0u8; 20];
        expected[19] = 0xe9; // 1001
        assert_eq!(address, Address::from(expected));
    }

    #[test]
    fn long_zero_address_falls_back_to_zero_on_garbage_input() {
        assert_eq!(long_zero_address("not-an-account-id"), Address::zero());
    }
}
