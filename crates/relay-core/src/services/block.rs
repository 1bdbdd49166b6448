//! `eth_getBlockByNumber/Hash`, `eth_blockNumber`, `eth_blobBaseFee` (§4.9 Block service).

use ethereum_types::{Bloom, H256, U256};
use serde_json::{json, Value};

use crate::errors::RpcErr;
use crate::relay_context::RelayContext;
use crate::types::{BlockIdentifierOrHash, BlockTag, RpcBlock};

pub(crate) fn parse_u256_field(block: &Value, field: &str) -> U256 {
    block
        .get(field)
        .and_then(Value::as_u64)
        .map(U256::from)
        .unwrap_or_default()
}

pub(crate) fn hash_field(block: &Value, field: &str) -> H256 {
    block
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<H256>().ok())
        .unwrap_or_default()
}

async fn current_head(relay: &RelayContext) -> Result<u64, RpcErr> {
    let latest = relay.mirror_node.get_latest_block().await?;
    Ok(latest
        .as_ref()
        .and_then(|block| block.get("number"))
        .and_then(Value::as_u64)
        .unwrap_or(0))
}

async fn fetch_mirror_block(relay: &RelayContext, identifier: &BlockIdentifierOrHash) -> Result<Option<Value>, RpcErr> {
    let path = match identifier {
        BlockIdentifierOrHash::Hash(hash) => format!("{hash:#x}"),
        BlockIdentifierOrHash::Tag(tag) => {
            let head = current_head(relay).await?;
            match tag.resolve_against_head(head) {
                BlockTag::Number(n) => n.to_string(),
                _ => unreachable!("resolve_against_head always returns Number"),
            }
        }
    };
    Ok(relay.mirror_node.get_block(&path).await?)
}

pub(crate) fn assemble_block(mirror_block: &Value) -> RpcBlock {
    RpcBlock {
        number: parse_u256_field(mirror_block, "number"),
        hash: hash_field(mirror_block, "hash"),
        parent_hash: hash_field(mirror_block, "previous_hash"),
        timestamp: mirror_block
            .get("timestamp")
            .and_then(|ts| ts.get("from"))
            .and_then(Value::as_str)
            .and_then(|s| s.split('.').next())
            .and_then(|s| s.parse::<u64>().ok())
            .map(U256::from)
            .unwrap_or_default(),
        gas_used: parse_u256_field(mirror_block, "gas_used"),
        gas_limit: U256::from(15_000_000u64),
        base_fee_per_gas: None,
        logs_bloom: mirror_block
            .get("logs_bloom")
            .and_then(Value::as_str)
            .and_then(|s| {
                let trimmed = s.strip_prefix("0x").unwrap_or(s);
                hex::decode(trimmed).ok()
            })
            .map(|bytes| Bloom::from_slice(&bytes))
            .unwrap_or_default(),
        transactions: Vec::new(),
    }
}

pub async fn get_block_by_number(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let tag = BlockTag::parse(
        params.first().cloned().ok_or(RpcErr::MissingRequiredParameter(0))?,
        0,
    )?;
    let identifier = BlockIdentifierOrHash::Tag(tag);
    match fetch_mirror_block(relay, &identifier).await? {
        Some(block) => Ok(serde_json::to_value(assemble_block(&block)).unwrap_or(Value::Null)),
        None => Ok(Value::Null),
    }
}

pub async fn get_block_by_hash(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let value = params.first().cloned().ok_or(RpcErr::MissingRequiredParameter(0))?;
    let identifier = BlockIdentifierOrHash::parse(value, 0)?;
    match fetch_mirror_block(relay, &identifier).await? {
        Some(block) => Ok(serde_json::to_value(assemble_block(&block)).unwrap_or(Value::Null)),
        None => Ok(Value::Null),
    }
}

pub async fn get_block_transaction_count_by_number(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let tag = BlockTag::parse(
        params.first().cloned().ok_or(RpcErr::MissingRequiredParameter(0))?,
        0,
    )?;
    let identifier = BlockIdentifierOrHash::Tag(tag);
    transaction_count(relay, &identifier).await
}

pub async fn get_block_transaction_count_by_hash(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let value = params.first().cloned().ok_or(RpcErr::MissingRequiredParameter(0))?;
    let identifier = BlockIdentifierOrHash::parse(value, 0)?;
    transaction_count(relay, &identifier).await
}

async fn transaction_count(relay: &RelayContext, identifier: &BlockIdentifierOrHash) -> Result<Value, RpcErr> {
    match fetch_mirror_block(relay, identifier).await? {
        Some(block) => {
            let count = block.get("count").and_then(Value::as_u64).unwrap_or(0);
            Ok(json!(format!("{count:#x}")))
        }
        None => Ok(Value::Null),
    }
}

pub async fn block_number(relay: &RelayContext, _params: &[Value]) -> Result<Value, RpcErr> {
    let head = current_head(relay).await?;
    Ok(json!(format!("{head:#x}")))
}

/// Hedera has no blob market (§4.9).
pub async fn blob_base_fee(_relay: &RelayContext, _params: &[Value]) -> Result<Value, RpcErr> {
    Ok(json!("0x0"))
}
