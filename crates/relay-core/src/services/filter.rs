//! `eth_getLogs`, `eth_newFilter`, `eth_newBlockFilter`, `eth_newPendingTransactionFilter`,
//! `eth_uninstallFilter`, `eth_getFilterLogs`, `eth_getFilterChanges` (§4.6 Filter service).

use ethereum_types::{Address, H256};
use serde_json::{json, Value};

use crate::errors::RpcErr;
use crate::filter::{FilterChanges, LogFilterParams};
use crate::relay_context::RelayContext;
use crate::types::{BlockTag, RpcLog};

fn parse_topics(value: &Value) -> Vec<H256> {
    value
        .get("topics")
        .and_then(Value::as_array)
        .unwrap_or(&Vec::new())
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|s| s.strip_prefix("0x").unwrap_or(s).parse::<H256>().ok())
        .collect()
}

fn parse_address(value: &Value) -> Option<Address> {
    value
        .get("address")
        .and_then(Value::as_str)
        .and_then(|s| s.strip_prefix("0x").unwrap_or(s).parse::<Address>().ok())
}

async fn resolve_block_bound(relay: &RelayContext, value: Option<&Value>, index: usize, default: BlockTag) -> Result<u64, RpcErr> {
    let tag = match value.cloned() {
        Some(Value::Null) | None => default,
        Some(value) => BlockTag::parse(value, index)?,
    };
    let head = relay.filters.current_head().await?;
    match tag.resolve_against_head(head) {
        BlockTag::Number(n) => Ok(n),
        _ => unreachable!("resolve_against_head always returns Number"),
    }
}

async fn parse_log_filter_params(relay: &RelayContext, value: &Value, index: usize) -> Result<LogFilterParams, RpcErr> {
    if !value.is_object() {
        return Err(RpcErr::InvalidParameter {
            index,
            reason: "expected a filter object".to_string(),
        });
    }
    let from_block = resolve_block_bound(relay, value.get("fromBlock"), index, BlockTag::Latest).await?;
    let to_block = resolve_block_bound(relay, value.get("toBlock"), index, BlockTag::Latest).await?;
    Ok(LogFilterParams {
        from_block,
        to_block,
        address: parse_address(value),
        topics: parse_topics(value),
    })
}

fn logs_to_value(logs: Vec<RpcLog>) -> Value {
    json!(logs)
}

pub async fn get_logs(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let filter_object = params.first().cloned().ok_or(RpcErr::MissingRequiredParameter(0))?;
    let params = parse_log_filter_params(relay, &filter_object, 0).await?;
    let logs = relay
        .filters
        .get_logs(params.from_block, params.to_block, params.address, &params.topics)
        .await?;
    Ok(logs_to_value(logs))
}

pub async fn new_filter(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let filter_object = params.first().cloned().ok_or(RpcErr::MissingRequiredParameter(0))?;
    let params = parse_log_filter_params(relay, &filter_object, 0).await?;
    let filter_id = relay.filters.new_filter(params).await?;
    Ok(json!(filter_id))
}

pub async fn new_block_filter(relay: &RelayContext, _params: &[Value]) -> Result<Value, RpcErr> {
    let filter_id = relay.filters.new_block_filter().await?;
    Ok(json!(filter_id))
}

pub async fn new_pending_transaction_filter(relay: &RelayContext, _params: &[Value]) -> Result<Value, RpcErr> {
    relay.filters.new_pending_transaction_filter().await.map(|id| json!(id))
}

fn filter_id_param(params: &[Value]) -> Result<String, RpcErr> {
    params
        .first()
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or(RpcErr::MissingRequiredParameter(0))
}

pub async fn uninstall_filter(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let filter_id = filter_id_param(params)?;
    let existed = relay.filters.uninstall_filter(&filter_id).await?;
    Ok(json!(existed))
}

pub async fn get_filter_logs(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let filter_id = filter_id_param(params)?;
    let logs = relay.filters.get_filter_logs(&filter_id).await?;
    Ok(logs_to_value(logs))
}

pub async fn get_filter_changes(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let filter_id = filter_id_param(params)?;
    match relay.filters.get_filter_changes(&filter_id).await? {
        FilterChanges::Logs(logs) => Ok(logs_to_value(logs)),
        FilterChanges::BlockHashes(hashes) => Ok(json!(hashes
            .into_iter()
            .map(|hash| format!("{hash:#x}"))
            .collect::<Vec<_>>())),
    }
}
