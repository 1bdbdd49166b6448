//! The method dispatcher: registration, validation, read-only gating, and
//! the caching/rate-limit decorators (§4.1).

pub mod params;

use std::collections::HashMap;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;

use crate::context::RequestContext;
use crate::errors::RpcErr;
use crate::relay_context::RelayContext;
use crate::services::{account, block, contract, debug, fee, filter, net_web3, transaction};
use params::ParamSpec;

type HandlerFn = for<'a> fn(
    &'a RelayContext,
    &'a [Value],
) -> Pin<Box<dyn Future<Output = Result<Value, RpcErr>> + Send + 'a>>;

/// A per-method caching rule: cache for `ttl` unless the argument at
/// `skip_index` matches one of `skip_values` (pipe-separated in the spec's
/// own notation; stored here already split) — §4.1.
#[derive(Clone)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub skip_index: Option<usize>,
    pub skip_values: Vec<&'static str>,
}

impl CachePolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, skip_index: None, skip_values: Vec::new() }
    }

    pub fn skip_when(mut self, index: usize, values: &[&'static str]) -> Self {
        self.skip_index = Some(index);
        self.skip_values = values.to_vec();
        self
    }

    /// A missing positional argument at the declared index also skips
    /// caching, so optional "latest" defaults do not poison the cache.
    fn should_skip(&self, params: &[Value]) -> bool {
        let Some(index) = self.skip_index else { return false };
        match params.get(index).and_then(Value::as_str) {
            Some(value) => self.skip_values.contains(&value),
            None => true,
        }
    }
}

pub struct MethodEntry {
    pub schema: &'static [ParamSpec],
    pub mutating: bool,
    pub cache: Option<CachePolicy>,
    pub rate_limit: Option<(u64, Duration)>,
    pub handler: HandlerFn,
}

macro_rules! handler {
    ($module:ident :: $func:ident) => {{
        fn wrapper<'a>(
            relay: &'a RelayContext,
            params: &'a [Value],
        ) -> Pin<Box<dyn Future<Output = Result<Value, RpcErr>> + Send + 'a>> {
            Box::pin($module::$func(relay, params))
        }
        wrapper as HandlerFn
    }};
}

fn latest_skip_policy(ttl_ms: u64, block_param_index: usize) -> CachePolicy {
    CachePolicy::new(Duration::from_millis(ttl_ms)).skip_when(block_param_index, &["latest", "pending"])
}

/// Builds the explicit method-registration table (§4.1): every dispatchable
/// method appears here exactly once, with its schema, mutating flag, and
/// optional cache/rate-limit policy.
pub fn build_registry(cache_ttl_ms: u64) -> HashMap<&'static str, MethodEntry> {
    use params::ParamType::*;

    let mut registry: HashMap<&'static str, MethodEntry> = HashMap::new();

    registry.insert(
        "eth_getBalance",
        MethodEntry {
            schema: &[
                ParamSpec { index: 0, param_type: Address, required: true },
                ParamSpec { index: 1, param_type: BlockNumberOrHash, required: false },
            ],
            mutating: false,
            cache: Some(latest_skip_policy(cache_ttl_ms, 1)),
            rate_limit: Some((200, Duration::from_secs(60))),
            handler: handler!(account::get_balance),
        },
    );
    registry.insert(
        "eth_getCode",
        MethodEntry {
            schema: &[
                ParamSpec { index: 0, param_type: Address, required: true },
                ParamSpec { index: 1, param_type: BlockNumberOrHash, required: false },
            ],
            mutating: false,
            cache: Some(CachePolicy::new(Duration::from_millis(cache_ttl_ms))),
            rate_limit: Some((200, Duration::from_secs(60))),
            handler: handler!(account::get_code),
        },
    );
    registry.insert(
        "eth_getStorageAt",
        MethodEntry {
            schema: &[
                ParamSpec { index: 0, param_type: Address, required: true },
                ParamSpec { index: 1, param_type: Hex, required: true },
                ParamSpec { index: 2, param_type: BlockNumberOrHash, required: false },
            ],
            mutating: false,
            cache: None,
            rate_limit: Some((200, Duration::from_secs(60))),
            handler: handler!(account::get_storage_at),
        },
    );
    registry.insert(
        "eth_accounts",
        MethodEntry {
            schema: &[],
            mutating: false,
            cache: None,
            rate_limit: None,
            handler: handler!(account::accounts),
        },
    );
    registry.insert(
        "eth_getTransactionCount",
        MethodEntry {
            schema: &[
                ParamSpec { index: 0, param_type: Address, required: true },
                ParamSpec { index: 1, param_type: BlockNumberOrHash, required: false },
            ],
            mutating: false,
            cache: Some(latest_skip_policy(cache_ttl_ms, 1)),
            rate_limit: Some((200, Duration::from_secs(60))),
            handler: handler!(account::get_transaction_count),
        },
    );
    registry.insert(
        "eth_getBlockByNumber",
        MethodEntry {
            schema: &[
                ParamSpec { index: 0, param_type: BlockNumber, required: true },
                ParamSpec { index: 1, param_type: Boolean, required: false },
            ],
            mutating: false,
            cache: Some(latest_skip_policy(cache_ttl_ms, 0)),
            rate_limit: Some((200, Duration::from_secs(60))),
            handler: handler!(block::get_block_by_number),
        },
    );
    registry.insert(
        "eth_getBlockByHash",
        MethodEntry {
            schema: &[
                ParamSpec { index: 0, param_type: BlockHash, required: true },
                ParamSpec { index: 1, param_type: Boolean, required: false },
            ],
            mutating: false,
            cache: Some(CachePolicy::new(Duration::from_millis(cache_ttl_ms))),
            rate_limit: Some((200, Duration::from_secs(60))),
            handler: handler!(block::get_block_by_hash),
        },
    );
    registry.insert(
        "eth_getBlockTransactionCountByNumber",
        MethodEntry {
            schema: &[ParamSpec { index: 0, param_type: BlockNumber, required: true }],
            mutating: false,
            cache: Some(latest_skip_policy(cache_ttl_ms, 0)),
            rate_limit: Some((200, Duration::from_secs(60))),
            handler: handler!(block::get_block_transaction_count_by_number),
        },
    );
    registry.insert(
        "eth_getBlockTransactionCountByHash",
        MethodEntry {
            schema: &[ParamSpec { index: 0, param_type: BlockHash, required: true }],
            mutating: false,
            cache: Some(CachePolicy::new(Duration::from_millis(cache_ttl_ms))),
            rate_limit: Some((200, Duration::from_secs(60))),
            handler: handler!(block::get_block_transaction_count_by_hash),
        },
    );
    registry.insert(
        "eth_blockNumber",
        MethodEntry {
            schema: &[],
            mutating: false,
            cache: Some(CachePolicy::new(Duration::from_millis(cache_ttl_ms))),
            rate_limit: Some((200, Duration::from_secs(60))),
            handler: handler!(block::block_number),
        },
    );
    registry.insert(
        "eth_blobBaseFee",
        MethodEntry {
            schema: &[],
            mutating: false,
            cache: None,
            rate_limit: None,
            handler: handler!(block::blob_base_fee),
        },
    );
    registry.insert(
        "eth_call",
        MethodEntry {
            schema: &[
                ParamSpec { index: 0, param_type: Transaction, required: true },
                ParamSpec { index: 1, param_type: BlockNumberOrHash, required: false },
            ],
            mutating: false,
            cache: None,
            rate_limit: Some((100, Duration::from_secs(60))),
            handler: handler!(contract::call),
        },
    );
    registry.insert(
        "eth_gasPrice",
        MethodEntry {
            schema: &[],
            mutating: false,
            cache: Some(CachePolicy::new(Duration::from_millis(cache_ttl_ms))),
            rate_limit: Some((200, Duration::from_secs(60))),
            handler: handler!(fee::gas_price),
        },
    );
    registry.insert(
        "eth_maxPriorityFeePerGas",
        MethodEntry {
            schema: &[],
            mutating: false,
            cache: Some(CachePolicy::new(Duration::from_millis(cache_ttl_ms))),
            rate_limit: Some((200, Duration::from_secs(60))),
            handler: handler!(fee::max_priority_fee_per_gas),
        },
    );
    registry.insert(
        "eth_feeHistory",
        MethodEntry {
            schema: &[
                ParamSpec { index: 0, param_type: Hex, required: true },
                ParamSpec { index: 1, param_type: BlockNumber, required: true },
                ParamSpec { index: 2, param_type: Array, required: false },
            ],
            mutating: false,
            cache: Some(CachePolicy::new(Duration::from_millis(cache_ttl_ms))),
            rate_limit: Some((200, Duration::from_secs(60))),
            handler: handler!(fee::fee_history),
        },
    );
    registry.insert(
        "debug_traceTransaction",
        MethodEntry {
            schema: &[
                ParamSpec { index: 0, param_type: TransactionHash, required: true },
                ParamSpec { index: 1, param_type: TracerConfig, required: false },
            ],
            mutating: false,
            cache: None,
            rate_limit: Some((20, Duration::from_secs(60))),
            handler: handler!(debug::trace_transaction),
        },
    );
    registry.insert(
        "debug_traceBlockByNumber",
        MethodEntry {
            schema: &[
                ParamSpec { index: 0, param_type: BlockNumber, required: true },
                ParamSpec { index: 1, param_type: TracerConfig, required: false },
            ],
            mutating: false,
            cache: None,
            rate_limit: Some((20, Duration::from_secs(60))),
            handler: handler!(debug::trace_block_by_number),
        },
    );
    registry.insert(
        "debug_traceBlockByHash",
        MethodEntry {
            schema: &[
                ParamSpec { index: 0, param_type: BlockHash, required: true },
                ParamSpec { index: 1, param_type: TracerConfig, required: false },
            ],
            mutating: false,
            cache: None,
            rate_limit: Some((20, Duration::from_secs(60))),
            handler: handler!(debug::trace_block_by_hash),
        },
    );
    registry.insert(
        "net_version",
        MethodEntry {
            schema: &[],
            mutating: false,
            cache: Some(CachePolicy::new(Duration::from_secs(3600))),
            rate_limit: None,
            handler: handler!(net_web3::net_version),
        },
    );
    registry.insert(
        "eth_chainId",
        MethodEntry {
            schema: &[],
            mutating: false,
            cache: Some(CachePolicy::new(Duration::from_secs(3600))),
            rate_limit: None,
            handler: handler!(net_web3::eth_chain_id),
        },
    );
    registry.insert(
        "net_listening",
        MethodEntry {
            schema: &[],
            mutating: false,
            cache: None,
            rate_limit: None,
            handler: handler!(net_web3::net_listening),
        },
    );
    registry.insert(
        "net_peerCount",
        MethodEntry {
            schema: &[],
            mutating: false,
            cache: None,
            rate_limit: None,
            handler: handler!(net_web3::net_peer_count),
        },
    );
    registry.insert(
        "web3_clientVersion",
        MethodEntry {
            schema: &[],
            mutating: false,
            cache: Some(CachePolicy::new(Duration::from_secs(3600))),
            rate_limit: None,
            handler: handler!(net_web3::web3_client_version),
        },
    );
    registry.insert(
        "web3_sha3",
        MethodEntry {
            schema: &[ParamSpec { index: 0, param_type: Hex, required: true }],
            mutating: false,
            cache: None,
            rate_limit: None,
            handler: handler!(net_web3::web3_sha3),
        },
    );

    registry.insert(
        "eth_getTransactionByHash",
        MethodEntry {
            schema: &[ParamSpec { index: 0, param_type: TransactionHash, required: true }],
            mutating: false,
            cache: Some(CachePolicy::new(Duration::from_millis(cache_ttl_ms))),
            rate_limit: Some((200, Duration::from_secs(60))),
            handler: handler!(transaction::get_transaction_by_hash),
        },
    );
    registry.insert(
        "eth_getTransactionByBlockHashAndIndex",
        MethodEntry {
            schema: &[
                ParamSpec { index: 0, param_type: BlockHash, required: true },
                ParamSpec { index: 1, param_type: Hex, required: true },
            ],
            mutating: false,
            cache: Some(CachePolicy::new(Duration::from_millis(cache_ttl_ms))),
            rate_limit: Some((200, Duration::from_secs(60))),
            handler: handler!(transaction::get_transaction_by_block_hash_and_index),
        },
    );
    registry.insert(
        "eth_getTransactionByBlockNumberAndIndex",
        MethodEntry {
            schema: &[
                ParamSpec { index: 0, param_type: BlockNumber, required: true },
                ParamSpec { index: 1, param_type: Hex, required: true },
            ],
            mutating: false,
            cache: Some(latest_skip_policy(cache_ttl_ms, 0)),
            rate_limit: Some((200, Duration::from_secs(60))),
            handler: handler!(transaction::get_transaction_by_block_number_and_index),
        },
    );
    registry.insert(
        "eth_getTransactionReceipt",
        MethodEntry {
            schema: &[ParamSpec { index: 0, param_type: TransactionHash, required: true }],
            mutating: false,
            cache: Some(CachePolicy::new(Duration::from_millis(cache_ttl_ms))),
            rate_limit: Some((200, Duration::from_secs(60))),
            handler: handler!(transaction::get_transaction_receipt),
        },
    );
    registry.insert(
        "eth_getBlockReceipts",
        MethodEntry {
            schema: &[ParamSpec { index: 0, param_type: BlockNumberOrHash, required: true }],
            mutating: false,
            cache: Some(latest_skip_policy(cache_ttl_ms, 0)),
            rate_limit: Some((100, Duration::from_secs(60))),
            handler: handler!(transaction::get_block_receipts),
        },
    );
    registry.insert(
        "eth_sendRawTransaction",
        MethodEntry {
            schema: &[ParamSpec { index: 0, param_type: Hex, required: true }],
            mutating: true,
            cache: None,
            rate_limit: Some((50, Duration::from_secs(60))),
            handler: handler!(transaction::send_raw_transaction),
        },
    );
    registry.insert(
        "eth_estimateGas",
        MethodEntry {
            schema: &[
                ParamSpec { index: 0, param_type: Transaction, required: true },
                ParamSpec { index: 1, param_type: BlockNumberOrHash, required: false },
            ],
            mutating: false,
            cache: None,
            rate_limit: Some((100, Duration::from_secs(60))),
            handler: handler!(contract::estimate_gas),
        },
    );
    registry.insert(
        "eth_getLogs",
        MethodEntry {
            schema: &[ParamSpec { index: 0, param_type: Filter, required: true }],
            mutating: false,
            cache: None,
            rate_limit: Some((100, Duration::from_secs(60))),
            handler: handler!(filter::get_logs),
        },
    );
    registry.insert(
        "eth_newFilter",
        MethodEntry {
            schema: &[ParamSpec { index: 0, param_type: Filter, required: true }],
            mutating: false,
            cache: None,
            rate_limit: Some((50, Duration::from_secs(60))),
            handler: handler!(filter::new_filter),
        },
    );
    registry.insert(
        "eth_newBlockFilter",
        MethodEntry {
            schema: &[],
            mutating: false,
            cache: None,
            rate_limit: Some((50, Duration::from_secs(60))),
            handler: handler!(filter::new_block_filter),
        },
    );
    registry.insert(
        "eth_newPendingTransactionFilter",
        MethodEntry {
            schema: &[],
            mutating: false,
            cache: None,
            rate_limit: Some((50, Duration::from_secs(60))),
            handler: handler!(filter::new_pending_transaction_filter),
        },
    );
    registry.insert(
        "eth_uninstallFilter",
        MethodEntry {
            schema: &[ParamSpec { index: 0, param_type: Hex64, required: true }],
            mutating: false,
            cache: None,
            rate_limit: Some((50, Duration::from_secs(60))),
            handler: handler!(filter::uninstall_filter),
        },
    );
    registry.insert(
        "eth_getFilterLogs",
        MethodEntry {
            schema: &[ParamSpec { index: 0, param_type: Hex64, required: true }],
            mutating: false,
            cache: None,
            rate_limit: Some((100, Duration::from_secs(60))),
            handler: handler!(filter::get_filter_logs),
        },
    );
    registry.insert(
        "eth_getFilterChanges",
        MethodEntry {
            schema: &[ParamSpec { index: 0, param_type: Hex64, required: true }],
            mutating: false,
            cache: None,
            rate_limit: Some((100, Duration::from_secs(60))),
            handler: handler!(filter::get_filter_changes),
        },
    );

    registry
}

/// `execute(method, params, context) → result | JsonRpcError` (§4.1).
pub struct Dispatcher {
    relay: RelayContext,
    registry: HashMap<&'static str, MethodEntry>,
}

impl Dispatcher {
    pub fn new(relay: RelayContext) -> Self {
        let registry = build_registry(relay.config.cache_ttl_ms);
        Self { relay, registry }
    }

    pub fn relay(&self) -> &RelayContext {
        &self.relay
    }

    pub async fn execute(
        &self,
        method: &str,
        params: &[Value],
        ip: IpAddr,
        context: &RequestContext,
    ) -> Result<Value, RpcErr> {
        let entry = self
            .registry
            .get(method)
            .ok_or_else(|| RpcErr::MethodNotFound(method.to_string()))?;

        params::validate(params, entry.schema)?;

        if entry.mutating && self.relay.config.read_only {
            return Err(RpcErr::UnsupportedMethod("read-only mode"));
        }

        if !self.relay.config.rate_limit_disabled {
            if let Some((limit, window)) = entry.rate_limit {
                let exceeded = self
                    .relay
                    .rate_limit
                    .increment_and_check(&ip.to_string(), method, limit, window)
                    .await;
                if exceeded {
                    return Err(RpcErr::IpRateLimitExceeded);
                }
            }
        }

        let cache_key = entry
            .cache
            .as_ref()
            .filter(|policy| !policy.should_skip(params))
            .map(|_| crate::cache::cache_key(method, params));

        if let Some(key) = &cache_key {
            if let Some(cached) = self.relay.cache.get(key).await {
                return Ok(cached);
            }
        }

        if context.is_cancelled() {
            return Err(RpcErr::RequestTimeout);
        }

        let result = (entry.handler)(&self.relay, params).await?;

        if let (Some(key), Some(policy)) = (&cache_key, &entry.cache) {
            if !context.is_cancelled() {
                self.relay.cache.set(key, &result, Some(policy.ttl)).await;
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_no_duplicate_insert_collisions() {
        let registry = build_registry(1000);
        assert!(registry.contains_key("eth_getBalance"));
        assert!(registry.contains_key("eth_chainId"));
        assert!(registry.contains_key("web3_sha3"));
    }

    #[test]
    fn cache_policy_skips_latest_block_tag() {
        let policy = latest_skip_policy(1000, 0);
        assert!(policy.should_skip(&[serde_json::json!("latest")]));
        assert!(!policy.should_skip(&[serde_json::json!("0x10")]));
    }
}
