//! `eth_feeHistory`, `eth_gasPrice`, `eth_maxPriorityFeePerGas` (§4.9 Fee-history service).

use ethereum_types::U256;
use serde_json::{json, Value};

use crate::errors::RpcErr;
use crate::relay_context::RelayContext;

const TINYBAR_TO_WEIBAR_MULTIPLIER: u128 = 10_000_000_000;

/// Tinybars-per-gas from `network/fees`, converted to weibars-per-gas.
pub(crate) async fn gas_price_weibars(relay: &RelayContext) -> Result<U256, RpcErr> {
    let fees = relay.mirror_node.get_network_fees().await?;
    let gas_price_tinybars = fees
        .as_ref()
        .and_then(|fees| fees.get("fees"))
        .and_then(Value::as_array)
        .and_then(|entries| entries.iter().find(|entry| entry.get("transaction_type").and_then(Value::as_str) == Some("EthereumTransaction")))
        .and_then(|entry| entry.get("gas"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    Ok(U256::from(gas_price_tinybars) * U256::from(TINYBAR_TO_WEIBAR_MULTIPLIER))
}

pub async fn gas_price(relay: &RelayContext, _params: &[Value]) -> Result<Value, RpcErr> {
    let price = gas_price_weibars(relay).await?;
    Ok(json!(format!("{price:#x}")))
}

/// Hedera has no priority-fee auction (§4.9): reuse the flat gas price.
pub async fn max_priority_fee_per_gas(relay: &RelayContext, _params: &[Value]) -> Result<Value, RpcErr> {
    let price = gas_price_weibars(relay).await?;
    Ok(json!(format!("{price:#x}")))
}

/// `eth_feeHistory(blockCount, newestBlock, rewardPercentiles)`.
pub async fn fee_history(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let reward_percentiles = params
        .get(2)
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);

    if relay.config.eth_fee_history_fixed {
        let price = gas_price_weibars(relay).await?;
        let head = {
            let latest = relay.mirror_node.get_latest_block().await?;
            latest.and_then(|block| block.get("number").and_then(Value::as_u64)).unwrap_or(0)
        };
        return Ok(json!({
            "oldestBlock": format!("{head:#x}"),
            "baseFeePerGas": vec![json!(format!("{price:#x}")); 2],
            "gasUsedRatio": vec![json!(0.5)],
            "reward": vec![vec![json!("0x0"); reward_percentiles]],
        }));
    }

    let requested_count = params
        .first()
        .and_then(Value::as_str)
        .and_then(|s| u64::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16).ok())
        .unwrap_or(1);
    let block_count = requested_count.min(relay.config.fee_history_max_results).max(1);

    let price = gas_price_weibars(relay).await?;
    let oldest_block = {
        let latest = relay.mirror_node.get_latest_block().await?;
        let head = latest.and_then(|block| block.get("number").and_then(Value::as_u64)).unwrap_or(0);
        head.saturating_sub(block_count - 1)
    };

    let base_fee_per_gas = vec![json!(format!("{price:#x}")); (block_count + 1) as usize];
    let gas_used_ratio = vec![json!(0.5); block_count as usize];
    let reward = vec![vec![json!("0x0"); reward_percentiles]; block_count as usize];

    Ok(json!({
        "oldestBlock": format!("{oldest_block:#x}"),
        "baseFeePerGas": base_fee_per_gas,
        "gasUsedRatio": gas_used_ratio,
        "reward": reward,
    }))
}
