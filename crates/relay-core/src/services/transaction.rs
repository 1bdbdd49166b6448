//! `eth_sendRawTransaction`, `eth_getTransaction*`, `eth_getBlockReceipts` (§4.5, §4.9 Receipt/transaction service).

use ethereum_types::{Address, Bloom, H256, U256};
use serde_json::{json, Value};

use crate::errors::RpcErr;
use crate::hbar_limit::SubscriberType;
use crate::relay_context::RelayContext;
use crate::sdk_client::EthereumTransaction;
use crate::types::{BlockIdentifierOrHash, BlockTag, RpcLog, RpcReceipt, RpcTransaction};

const TINYBAR_TO_WEIBAR_MULTIPLIER: u128 = 10_000_000_000;

fn hex_field(record: &Value, field: &str) -> U256 {
    record
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| U256::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16).ok())
        .unwrap_or_default()
}

fn address_field(record: &Value, field: &str) -> Option<Address> {
    record
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| s.strip_prefix("0x").unwrap_or(s).parse::<Address>().ok())
}

fn hash_field(record: &Value, field: &str) -> Option<H256> {
    record
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| s.strip_prefix("0x").unwrap_or(s).parse::<H256>().ok())
}

fn assemble_transaction(record: &Value, chain_id: &str) -> RpcTransaction {
    RpcTransaction {
        hash: hash_field(record, "hash").unwrap_or_default(),
        nonce: record.get("nonce").and_then(Value::as_u64).map(U256::from).unwrap_or_default(),
        block_hash: hash_field(record, "block_hash"),
        block_number: record.get("block_number").and_then(Value::as_u64).map(U256::from),
        transaction_index: record.get("transaction_index").and_then(Value::as_u64).map(U256::from),
        from: address_field(record, "from").unwrap_or_default(),
        to: address_field(record, "to"),
        value: record
            .get("amount")
            .and_then(Value::as_u64)
            .map(|tinybars| U256::from(tinybars) * U256::from(TINYBAR_TO_WEIBAR_MULTIPLIER))
            .unwrap_or_default(),
        gas: record.get("gas_used").and_then(Value::as_u64).map(U256::from).unwrap_or_default(),
        gas_price: hex_field(record, "gas_price"),
        input: record.get("function_parameters").and_then(Value::as_str).unwrap_or("0x").to_string(),
        chain_id: chain_id.to_string(),
    }
}

fn assemble_receipt(record: &Value, logs: Vec<RpcLog>) -> RpcReceipt {
    let result = record.get("result").and_then(Value::as_str).unwrap_or("");
    RpcReceipt {
        transaction_hash: hash_field(record, "hash").unwrap_or_default(),
        transaction_index: record.get("transaction_index").and_then(Value::as_u64).map(U256::from).unwrap_or_default(),
        block_hash: hash_field(record, "block_hash").unwrap_or_default(),
        block_number: record.get("block_number").and_then(Value::as_u64).map(U256::from).unwrap_or_default(),
        from: address_field(record, "from").unwrap_or_default(),
        to: address_field(record, "to"),
        cumulative_gas_used: record.get("gas_used").and_then(Value::as_u64).map(U256::from).unwrap_or_default(),
        gas_used: record.get("gas_used").and_then(Value::as_u64).map(U256::from).unwrap_or_default(),
        contract_address: record
            .get("created_contract_ids")
            .and_then(Value::as_array)
            .and_then(|ids| ids.first())
            .and_then(Value::as_str)
            .and_then(|s| s.strip_prefix("0x").unwrap_or(s).parse::<Address>().ok()),
        logs,
        status: RpcReceipt::status_from_mirror_result(result),
        logs_bloom: record
            .get("bloom")
            .and_then(Value::as_str)
            .and_then(|s| hex::decode(s.strip_prefix("0x").unwrap_or(s)).ok())
            .map(|bytes| Bloom::from_slice(&bytes))
            .unwrap_or_default(),
    }
}

async fn logs_for(relay: &RelayContext, id_or_hash: &str) -> Result<Vec<RpcLog>, RpcErr> {
    let path = format!("api/v1/contracts/results/{id_or_hash}/logs");
    let page: Option<Value> = relay.mirror_node.get_json(&path).await?;
    Ok(page
        .and_then(|page| page.get("logs").cloned())
        .and_then(|logs| logs.as_array().cloned())
        .unwrap_or_default()
        .iter()
        .filter_map(parse_log)
        .collect())
}

fn parse_log(entry: &Value) -> Option<RpcLog> {
    Some(RpcLog {
        address: address_field(entry, "address")?,
        topics: entry
            .get("topics")?
            .as_array()?
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|s| s.strip_prefix("0x").unwrap_or(s).parse::<H256>().ok())
            .collect(),
        data: entry.get("data").and_then(Value::as_str).unwrap_or("0x").to_string(),
        block_hash: hash_field(entry, "block_hash").unwrap_or_default(),
        block_number: entry.get("block_number").and_then(Value::as_u64).map(U256::from).unwrap_or_default(),
        transaction_hash: hash_field(entry, "transaction_hash").unwrap_or_default(),
        transaction_index: entry.get("transaction_index").and_then(Value::as_u64).map(U256::from).unwrap_or_default(),
        log_index: entry.get("index").and_then(Value::as_u64).map(U256::from).unwrap_or_default(),
        removed: false,
    })
}

pub async fn get_transaction_by_hash(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let hash = params.first().and_then(Value::as_str).ok_or(RpcErr::MissingRequiredParameter(0))?;
    let record = relay.mirror_node.get_contract_result(hash).await?;
    match record {
        Some(record) => Ok(serde_json::to_value(assemble_transaction(&record, &relay.config.chain_id)).unwrap_or(Value::Null)),
        None => Ok(Value::Null),
    }
}

pub async fn get_transaction_receipt(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let hash = params.first().and_then(Value::as_str).ok_or(RpcErr::MissingRequiredParameter(0))?;
    let record = relay.mirror_node.get_contract_result(hash).await?;
    match record {
        Some(record) => {
            let logs = logs_for(relay, hash).await?;
            Ok(serde_json::to_value(assemble_receipt(&record, logs)).unwrap_or(Value::Null))
        }
        None => Ok(Value::Null),
    }
}

async fn transaction_hashes_for_block(relay: &RelayContext, identifier: &BlockIdentifierOrHash) -> Result<Vec<String>, RpcErr> {
    let path = match identifier {
        BlockIdentifierOrHash::Hash(hash) => format!("{hash:#x}"),
        BlockIdentifierOrHash::Tag(tag) => {
            let head = relay
                .mirror_node
                .get_latest_block()
                .await?
                .and_then(|block| block.get("number").and_then(Value::as_u64))
                .unwrap_or(0);
            match tag.resolve_against_head(head) {
                BlockTag::Number(n) => n.to_string(),
                _ => unreachable!("resolve_against_head always returns Number"),
            }
        }
    };
    let block = relay.mirror_node.get_block(&path).await?;
    Ok(block
        .and_then(|block| block.get("transactions").cloned())
        .and_then(|txs| txs.as_array().cloned())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|tx| tx.get("transaction_id").and_then(Value::as_str).map(ToString::to_string))
        .collect())
}

async fn transaction_by_block_and_index(
    relay: &RelayContext,
    identifier: BlockIdentifierOrHash,
    index: usize,
) -> Result<Value, RpcErr> {
    let hashes = transaction_hashes_for_block(relay, &identifier).await?;
    let Some(id) = hashes.get(index) else {
        return Ok(Value::Null);
    };
    let record = relay.mirror_node.get_contract_result(id).await?;
    match record {
        Some(record) => Ok(serde_json::to_value(assemble_transaction(&record, &relay.config.chain_id)).unwrap_or(Value::Null)),
        None => Ok(Value::Null),
    }
}

pub async fn get_transaction_by_block_hash_and_index(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let hash = params.first().cloned().ok_or(RpcErr::MissingRequiredParameter(0))?;
    let identifier = BlockIdentifierOrHash::parse(hash, 0)?;
    let index = params
        .get(1)
        .and_then(Value::as_str)
        .and_then(|s| u64::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16).ok())
        .ok_or(RpcErr::MissingRequiredParameter(1))? as usize;
    transaction_by_block_and_index(relay, identifier, index).await
}

pub async fn get_transaction_by_block_number_and_index(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let tag = BlockTag::parse(params.first().cloned().ok_or(RpcErr::MissingRequiredParameter(0))?, 0)?;
    let index = params
        .get(1)
        .and_then(Value::as_str)
        .and_then(|s| u64::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16).ok())
        .ok_or(RpcErr::MissingRequiredParameter(1))? as usize;
    transaction_by_block_and_index(relay, BlockIdentifierOrHash::Tag(tag), index).await
}

pub async fn get_block_receipts(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let value = params.first().cloned().ok_or(RpcErr::MissingRequiredParameter(0))?;
    let identifier = BlockIdentifierOrHash::parse(value, 0)?;
    let hashes = transaction_hashes_for_block(relay, &identifier).await?;
    let mut receipts = Vec::with_capacity(hashes.len());
    for id in hashes {
        if let Some(record) = relay.mirror_node.get_contract_result(&id).await? {
            let logs = logs_for(relay, &id).await?;
            receipts.push(serde_json::to_value(assemble_receipt(&record, logs)).unwrap_or(Value::Null));
        }
    }
    Ok(Value::Array(receipts))
}

/// `eth_sendRawTransaction(rawTx)` — the jumbo-transaction submission path (§4.5).
pub async fn send_raw_transaction(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let raw_hex = params.first().and_then(Value::as_str).ok_or(RpcErr::MissingRequiredParameter(0))?;
    let raw_bytes = hex::decode(raw_hex.strip_prefix("0x").unwrap_or(raw_hex)).map_err(|_| RpcErr::InvalidParameter {
        index: 0,
        reason: "rawTx is not valid hex".to_string(),
    })?;

    let parsed = EthereumTransaction::parse(raw_bytes.clone())?;
    let caller_address = Address::zero();
    let context = crate::context::RequestContext::new("0.0.0.0".parse().unwrap(), "eth_sendRawTransaction");

    let gas_price_weibars = super::fee::gas_price_weibars(relay).await?;
    let network_gas_price_tinybars = (gas_price_weibars / U256::from(TINYBAR_TO_WEIBAR_MULTIPLIER)).as_u64();
    let exchange_rate_cents = relay
        .mirror_node
        .get_network_exchange_rate()
        .await?
        .and_then(|rate| rate.get("current_rate")?.get("cent_equivalent")?.as_u64())
        .unwrap_or(1);

    let chunk_size = relay.config.file_append_chunk_size as usize;
    let needs_offload = !relay.config.jumbo_tx_enabled && parsed.call_data_hex.len() > chunk_size;
    let estimated_fee_tinybars = needs_offload.then(|| {
        crate::sdk_client::estimate_hfs_offload_fee_tinybars(parsed.call_data_hex.len(), chunk_size, exchange_rate_cents)
    });

    if relay
        .hbar_limit
        .should_limit(
            "eth_sendRawTransaction",
            "EthereumTransaction",
            caller_address,
            &context,
            SubscriberType::Basic,
            estimated_fee_tinybars,
        )
        .await
    {
        return Err(RpcErr::HbarRateLimitExceeded);
    }

    let result = relay
        .sdk_client
        .submit_ethereum_transaction(
            parsed.raw_bytes,
            &context,
            caller_address,
            &relay.config,
            network_gas_price_tinybars,
            exchange_rate_cents,
        )
        .await?;

    let hash = keccak_hash::keccak(&raw_bytes);
    let _ = result.file_id;
    Ok(json!(format!("{hash:#x}")))
}
