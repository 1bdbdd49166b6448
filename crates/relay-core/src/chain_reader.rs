//! The production `FilterChainReader`/`SubscriptionChainReader` implementation,
//! backed directly by the Mirror Node REST client (§4.6, §4.7).

use std::sync::Arc;

use async_trait::async_trait;
use ethereum_types::{Address, H256, U256};
use serde_json::Value;

use crate::errors::RpcErr;
use crate::filter::FilterChainReader;
use crate::mirror_node::MirrorNodeClient;
use crate::services::block::assemble_block;
use crate::subscription::{SubscriptionChainReader, SubscriptionEvent};
use crate::types::{RpcBlock, RpcLog};

pub struct MirrorChainReader {
    mirror_node: Arc<MirrorNodeClient>,
}

impl MirrorChainReader {
    pub fn new(mirror_node: Arc<MirrorNodeClient>) -> Self {
        Self { mirror_node }
    }

    async fn head(&self) -> Result<u64, RpcErr> {
        let latest = self.mirror_node.get_latest_block().await?;
        Ok(latest
            .as_ref()
            .and_then(|block| block.get("number"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    async fn logs_in_range(
        &self,
        from_block: u64,
        to_block: u64,
        address: Option<Address>,
        topics: &[H256],
    ) -> Result<Vec<RpcLog>, RpcErr> {
        let mut query = format!("timestamp=gte:{from_block}&timestamp=lte:{to_block}");
        if let Some(address) = address {
            query.push_str(&format!("&contract.id={address:#x}"));
        }
        for topic in topics {
            query.push_str(&format!("&topic0={topic:#x}"));
        }
        let entries = self.mirror_node.get_contract_result_logs(&query).await?;
        Ok(entries.iter().filter_map(parse_log).collect())
    }
}

fn parse_log(entry: &Value) -> Option<RpcLog> {
    let address = entry.get("address")?.as_str()?.strip_prefix("0x").unwrap_or("").parse().ok()?;
    let topics = entry
        .get("topics")?
        .as_array()?
        .iter()
        .filter_map(|t| t.as_str())
        .filter_map(|s| s.strip_prefix("0x").unwrap_or(s).parse::<H256>().ok())
        .collect();
    let data = entry.get("data").and_then(Value::as_str).unwrap_or("0x").to_string();
    let block_hash = entry
        .get("block_hash")
        .and_then(Value::as_str)
        .and_then(|s| s.strip_prefix("0x").unwrap_or(s).parse::<H256>().ok())
        .unwrap_or_default();
    let block_number = entry.get("block_number").and_then(Value::as_u64).map(U256::from).unwrap_or_default();
    let transaction_hash = entry
        .get("transaction_hash")
        .and_then(Value::as_str)
        .and_then(|s| s.strip_prefix("0x").unwrap_or(s).parse::<H256>().ok())
        .unwrap_or_default();
    let transaction_index = entry.get("transaction_index").and_then(Value::as_u64).map(U256::from).unwrap_or_default();
    let log_index = entry.get("index").and_then(Value::as_u64).map(U256::from).unwrap_or_default();

    Some(RpcLog {
        address,
        topics,
        data,
        block_hash,
        block_number,
        transaction_hash,
        transaction_index,
        log_index,
        removed: false,
    })
}

#[async_trait]
impl FilterChainReader for MirrorChainReader {
    async fn current_head(&self) -> Result<u64, RpcErr> {
        self.head().await
    }

    async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Option<Address>,
        topics: &[H256],
    ) -> Result<Vec<RpcLog>, RpcErr> {
        self.logs_in_range(from_block, to_block, address, topics).await
    }

    async fn get_block_hashes_since(&self, from_block_exclusive: u64) -> Result<Vec<(u64, H256)>, RpcErr> {
        let head = self.head().await?;
        let mut hashes = Vec::new();
        for number in (from_block_exclusive + 1)..=head {
            if let Some(block) = self.mirror_node.get_block(&number.to_string()).await? {
                let hash = block
                    .get("hash")
                    .and_then(Value::as_str)
                    .and_then(|s| s.strip_prefix("0x").unwrap_or(s).parse::<H256>().ok())
                    .unwrap_or_default();
                hashes.push((number, hash));
            }
        }
        Ok(hashes)
    }
}

#[async_trait]
impl SubscriptionChainReader for MirrorChainReader {
    async fn current_head(&self) -> Result<u64, RpcErr> {
        self.head().await
    }

    async fn get_logs_since(&self, event: &SubscriptionEvent, since_block: u64, head: u64) -> Result<Vec<RpcLog>, RpcErr> {
        let SubscriptionEvent::Logs { address, topics } = event else {
            return Ok(Vec::new());
        };
        let address = address
            .as_ref()
            .and_then(|s| s.strip_prefix("0x").unwrap_or(s).parse::<Address>().ok());
        self.logs_in_range(since_block + 1, head, address, topics).await
    }

    async fn get_latest_block(&self) -> Result<RpcBlock, RpcErr> {
        let latest = self.mirror_node.get_latest_block().await?.unwrap_or(Value::Null);
        Ok(assemble_block(&latest))
    }
}
