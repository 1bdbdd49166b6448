use ethereum_types::{Bloom, H256, U256};
use serde::Serialize;

/// Ethereum-shaped block, assembled from a mirror node `blocks/{n|hash}` read
/// plus its associated transactions (§4.9 Block service).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    pub number: U256,
    pub hash: H256,
    pub parent_hash: H256,
    pub timestamp: U256,
    pub gas_used: U256,
    pub gas_limit: U256,
    pub base_fee_per_gas: Option<U256>,
    pub logs_bloom: Bloom,
    pub transactions: Vec<serde_json::Value>,
}

/// A single `eth_getLogs`/filter-changes log entry.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: ethereum_types::Address,
    pub topics: Vec<H256>,
    pub data: String,
    pub block_hash: H256,
    pub block_number: U256,
    pub transaction_hash: H256,
    pub transaction_index: U256,
    pub log_index: U256,
    pub removed: bool,
}
