//! Log and new-block filters (§4.6, §3 Filter).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethereum_types::{Address, H256, U256};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::cache::{cache_key, CacheService};
use crate::errors::RpcErr;
use crate::types::RpcLog;

const FILTER_CACHE_PREFIX: &str = "filter";
const FILTER_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFilterParams {
    pub from_block: u64,
    pub to_block: u64,
    pub address: Option<Address>,
    pub topics: Vec<H256>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FilterKind {
    Log { params: LogFilterParams },
    NewBlock,
}

/// `{filter_id, type, params, last_queried_block, created_at, ttl}` (§3 Filter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub filter_id: String,
    pub kind: FilterKind,
    pub last_queried_block: Option<u64>,
    pub created_at_block: u64,
}

/// What the filter service needs from the rest of the relay to resolve a
/// block range and answer `get_filter_changes` — kept as a trait so tests
/// can supply canned data instead of a live mirror node client.
#[async_trait]
pub trait FilterChainReader: Send + Sync {
    async fn current_head(&self) -> Result<u64, RpcErr>;
    async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Option<Address>,
        topics: &[H256],
    ) -> Result<Vec<RpcLog>, RpcErr>;
    async fn get_block_hashes_since(&self, from_block_exclusive: u64) -> Result<Vec<(u64, H256)>, RpcErr>;
}

fn random_filter_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}

/// Enabled only when `FILTER_API_ENABLED`; every operation otherwise
/// returns `UnsupportedMethod` (§4.6).
pub struct FilterService {
    cache: Arc<CacheService>,
    reader: Arc<dyn FilterChainReader>,
    enabled: bool,
}

impl FilterService {
    pub fn new(cache: Arc<CacheService>, reader: Arc<dyn FilterChainReader>, enabled: bool) -> Self {
        Self {
            cache,
            reader,
            enabled,
        }
    }

    fn require_enabled(&self, method: &'static str) -> Result<(), RpcErr> {
        if self.enabled {
            Ok(())
        } else {
            Err(RpcErr::UnsupportedMethod(method))
        }
    }

    fn storage_key(filter_id: &str) -> String {
        cache_key(FILTER_CACHE_PREFIX, &[serde_json::json!(filter_id)])
    }

    /// Exposed so callers can resolve `"latest"`/hex block tags against the
    /// same chain head the filter operations themselves use.
    pub async fn current_head(&self) -> Result<u64, RpcErr> {
        self.reader.current_head().await
    }

    /// `eth_getLogs`: a one-shot, unstored query over the same chain reader
    /// `get_filter_logs` uses for an installed filter (§4.6).
    pub async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Option<Address>,
        topics: &[H256],
    ) -> Result<Vec<RpcLog>, RpcErr> {
        self.require_enabled("eth_getLogs")?;
        if from_block > to_block {
            return Err(RpcErr::InvalidBlockRange);
        }
        self.reader.get_logs(from_block, to_block, address, topics).await
    }

    pub async fn new_filter(&self, params: LogFilterParams) -> Result<String, RpcErr> {
        self.require_enabled("eth_newFilter")?;
        let head = self.reader.current_head().await?;
        let to_block = if params.to_block == 0 { head } else { params.to_block };
        if params.from_block > to_block {
            return Err(RpcErr::InvalidBlockRange);
        }

        let filter = Filter {
            filter_id: random_filter_id(),
            kind: FilterKind::Log {
                params: LogFilterParams {
                    to_block,
                    ..params
                },
            },
            last_queried_block: None,
            created_at_block: head,
        };
        self.store(&filter).await;
        Ok(filter.filter_id)
    }

    pub async fn new_block_filter(&self) -> Result<String, RpcErr> {
        self.require_enabled("eth_newBlockFilter")?;
        let head = self.reader.current_head().await?;
        let filter = Filter {
            filter_id: random_filter_id(),
            kind: FilterKind::NewBlock,
            last_queried_block: None,
            created_at_block: head,
        };
        self.store(&filter).await;
        Ok(filter.filter_id)
    }

    /// §4.6: always unsupported — Hedera has no mempool to subscribe to.
    pub async fn new_pending_transaction_filter(&self) -> Result<String, RpcErr> {
        self.require_enabled("eth_newPendingTransactionFilter")?;
        Err(RpcErr::UnsupportedMethod("eth_newPendingTransactionFilter"))
    }

    pub async fn uninstall_filter(&self, filter_id: &str) -> Result<bool, RpcErr> {
        self.require_enabled("eth_uninstallFilter")?;
        let key = Self::storage_key(filter_id);
        let existed = self.cache.get(&key).await.is_some();
        self.cache.delete(&key).await;
        Ok(existed)
    }

    async fn load(&self, filter_id: &str) -> Result<Filter, RpcErr> {
        let key = Self::storage_key(filter_id);
        let value = self.cache.get(&key).await.ok_or(RpcErr::FilterNotFound)?;
        serde_json::from_value(value).map_err(|_| RpcErr::FilterNotFound)
    }

    async fn store(&self, filter: &Filter) {
        let key = Self::storage_key(&filter.filter_id);
        self.cache.set(&key, filter, Some(FILTER_TTL)).await;
    }

    pub async fn get_filter_logs(&self, filter_id: &str) -> Result<Vec<RpcLog>, RpcErr> {
        self.require_enabled("eth_getFilterLogs")?;
        let filter = self.load(filter_id).await?;
        let FilterKind::Log { params } = &filter.kind else {
            self.store(&filter).await;
            return Ok(Vec::new());
        };
        let logs = self
            .reader
            .get_logs(params.from_block, params.to_block, params.address, &params.topics)
            .await?;
        self.store(&filter).await;
        Ok(logs)
    }

    /// §4.6: log filters advance `last_queried` to one past the highest
    /// block number seen (or `head + 1` when nothing matched); new-block
    /// filters return hashes strictly after the last queried block.
    pub async fn get_filter_changes(&self, filter_id: &str) -> Result<FilterChanges, RpcErr> {
        self.require_enabled("eth_getFilterChanges")?;
        let mut filter = self.load(filter_id).await?;
        let head = self.reader.current_head().await?;

        let changes = match &filter.kind {
            FilterKind::Log { params } => {
                let from_block = filter.last_queried_block.unwrap_or(params.from_block);
                let to_block = params.to_block.min(head);
                let logs = if from_block > to_block {
                    Vec::new()
                } else {
                    self.reader
                        .get_logs(from_block, to_block, params.address, &params.topics)
                        .await?
                };
                let next = logs
                    .iter()
                    .map(|log| log.block_number.as_u64())
                    .max()
                    .map(|n| n + 1)
                    .unwrap_or(head + 1);
                filter.last_queried_block = Some(next);
                FilterChanges::Logs(logs)
            }
            FilterKind::NewBlock => {
                let since = filter.last_queried_block.unwrap_or(filter.created_at_block);
                let hashes = self.reader.get_block_hashes_since(since).await?;
                filter.last_queried_block = Some(hashes.last().map(|(n, _)| *n).unwrap_or(head));
                FilterChanges::BlockHashes(hashes.into_iter().map(|(_, hash)| hash).collect())
            }
        };

        self.store(&filter).await;
        Ok(changes)
    }
}

#[derive(Debug, Clone)]
pub enum FilterChanges {
    Logs(Vec<RpcLog>),
    BlockHashes(Vec<H256>),
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedReader {
        head: u64,
        logs: Vec<RpcLog>,
    }

    #[async_trait]
    impl FilterChainReader for FixedReader {
        async fn current_head(&self) -> Result<u64, RpcErr> {
            Ok(self.head)
        }

        async fn get_logs(
            &self,
            from_block: u64,
            to_block: u64,
            _address: Option<Address>,
            _topics: &[H256],
        ) -> Result<Vec<RpcLog>, RpcErr> {
            Ok(self
                .logs
                .iter()
                .filter(|log| {
                    let n = log.block_number.as_u64();
                    n >= from_block && n <= to_block
                })
                .cloned()
                .collect())
        }

        async fn get_block_hashes_since(&self, from_block_exclusive: u64) -> Result<Vec<(u64, H256)>, RpcErr> {
            Ok((from_block_exclusive + 1..=self.head).map(|n| (n, H256::from_low_u64_be(n))).collect())
        }
    }

    fn sample_log(block_number: u64) -> RpcLog {
        RpcLog {
            address: Address::zero(),
            topics: vec![],
            data: "0x".to_string(),
            block_hash: H256::zero(),
            block_number: U256::from(block_number),
            transaction_hash: H256::zero(),
            transaction_index: U256::zero(),
            log_index: U256::zero(),
            removed: false,
        }
    }

    fn service(reader: FixedReader) -> FilterService {
        let cache = Arc::new(CacheService::new(Duration::from_secs(300), None));
        FilterService::new(cache, Arc::new(reader), true)
    }

    #[tokio::test]
    async fn disabled_filter_api_rejects_every_operation() {
        let cache = Arc::new(CacheService::new(Duration::from_secs(300), None));
        let service = FilterService::new(
            cache,
            Arc::new(FixedReader { head: 10, logs: vec![] }),
            false,
        );
        let err = service
            .new_filter(LogFilterParams {
                from_block: 0,
                to_block: 0,
                address: None,
                topics: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RpcErr::UnsupportedMethod(_)));
    }

    #[tokio::test]
    async fn log_filter_advances_last_queried_past_results() {
        let reader = FixedReader {
            head: 20,
            logs: vec![sample_log(5), sample_log(8)],
        };
        let service = service(reader);
        let id = service
            .new_filter(LogFilterParams {
                from_block: 0,
                to_block: 0,
                address: None,
                topics: vec![],
            })
            .await
            .unwrap();

        let changes = service.get_filter_changes(&id).await.unwrap();
        let FilterChanges::Logs(logs) = changes else { panic!("expected logs") };
        assert_eq!(logs.len(), 2);

        let second = service.get_filter_changes(&id).await.unwrap();
        let FilterChanges::Logs(logs) = second else { panic!("expected logs") };
        assert!(logs.is_empty());
    }

    #[tokio::test]
    async fn uninstalled_filter_is_not_found_afterwards() {
        let service = service(FixedReader { head: 1, logs: vec![] });
        let id = service.new_block_filter().await.unwrap();
        assert!(service.uninstall_filter(&id).await.unwrap());
        let err = service.get_filter_changes(&id).await.unwrap_err();
        assert!(matches!(err, RpcErr::FilterNotFound));
    }
}
