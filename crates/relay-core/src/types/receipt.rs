use ethereum_types::{Address, H256, U256};
use serde::Serialize;

use super::block::RpcLog;

/// Ethereum-shaped transaction receipt, assembled from a mirror node
/// `contracts/results/{id}` record (§4.9 Receipt/transaction service).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub transaction_hash: H256,
    pub transaction_index: U256,
    pub block_hash: H256,
    pub block_number: U256,
    pub from: Address,
    pub to: Option<Address>,
    pub cumulative_gas_used: U256,
    pub gas_used: U256,
    pub contract_address: Option<Address>,
    pub logs: Vec<RpcLog>,
    pub status: U256,
    pub logs_bloom: ethereum_types::Bloom,
}

impl RpcReceipt {
    /// Hedera's mirror node reports `result` as a human-readable status
    /// string; only `"SUCCESS"` maps onto Ethereum's `status: 0x1`.
    pub fn status_from_mirror_result(result: &str) -> U256 {
        if result == "SUCCESS" {
            U256::one()
        } else {
            U256::zero()
        }
    }
}
