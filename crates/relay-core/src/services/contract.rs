//! `eth_call` / `eth_estimateGas` (§4.8 Translation services, contract-call path example).

use serde_json::{json, Value};

use crate::errors::RpcErr;
use crate::mirror_node::MirrorNodeClientError;
use crate::relay_context::RelayContext;
use crate::services::fee::gas_price_weibars;
use crate::types::{BlockIdentifierOrHash, BlockTag, ContractCallRequest};

const MAX_GAS_PER_SEC: u64 = 15_000_000;

async fn resolve_block_number(relay: &RelayContext, identifier: BlockIdentifierOrHash) -> Result<u64, RpcErr> {
    match identifier {
        BlockIdentifierOrHash::Hash(_) => {
            // Hash-pinned simulation is out of scope for the mirror node call
            // endpoint, which only accepts a block number; fall back to head.
            current_head(relay).await
        }
        BlockIdentifierOrHash::Tag(tag) => {
            let head = current_head(relay).await?;
            match tag.resolve_against_head(head) {
                BlockTag::Number(n) => Ok(n),
                _ => unreachable!("resolve_against_head always returns Number"),
            }
        }
    }
}

async fn current_head(relay: &RelayContext) -> Result<u64, RpcErr> {
    let latest = relay.mirror_node.get_latest_block().await?;
    Ok(latest
        .and_then(|block| block.get("number").and_then(Value::as_u64))
        .unwrap_or(0))
}

fn mirror_call_body(request: &ContractCallRequest, block_number: u64) -> Value {
    json!({
        "from": request.from.map(|a| format!("{a:#x}")),
        "to": request.to.map(|a| format!("{a:#x}")),
        "data": request.data.as_ref().map(|d| format!("0x{}", hex::encode(d))),
        "gas": request.gas.map(|g| g.min(MAX_GAS_PER_SEC)),
        "gasPrice": request.gas_price.map(|g| format!("{g:#x}")),
        "value": request.value_tinybars,
        "block": block_number,
        "estimate": false,
    })
}

/// §3 ContractCallRequest: a missing `gasPrice` defaults to the current
/// network gas price.
async fn default_gas_price(relay: &RelayContext, request: &mut ContractCallRequest) -> Result<(), RpcErr> {
    if request.gas_price.is_none() {
        request.gas_price = Some(gas_price_weibars(relay).await?.as_u64());
    }
    Ok(())
}

/// Steps 1-11 of §4.8's worked example.
pub async fn call(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let raw_request = params.first().cloned().ok_or(RpcErr::MissingRequiredParameter(0))?;
    let block_value = params.get(1).cloned().unwrap_or(Value::String("latest".to_string()));

    let mut request = ContractCallRequest::parse(raw_request, 0, relay.operator_address)?;
    let block_identifier = BlockIdentifierOrHash::parse(block_value, 1)?;
    let block_number = resolve_block_number(relay, block_identifier).await?;
    default_gas_price(relay, &mut request).await?;

    let body = mirror_call_body(&request, block_number);
    match relay.mirror_node.post_contract_call(&body).await {
        Ok(response) => {
            let result = response
                .get("result")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or("0x");
            Ok(json!(result))
        }
        Err(err) => translate_call_error(err),
    }
}

/// `eth_estimateGas`: same mirror node call path as `eth_call`, with
/// `estimate: true` and the `gas_used` field of the response returned
/// instead of the call's return data (§4.8).
pub async fn estimate_gas(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let raw_request = params.first().cloned().ok_or(RpcErr::MissingRequiredParameter(0))?;
    let block_value = params.get(1).cloned().unwrap_or(Value::String("latest".to_string()));

    let mut request = ContractCallRequest::parse(raw_request, 0, relay.operator_address)?;
    let block_identifier = BlockIdentifierOrHash::parse(block_value, 1)?;
    let block_number = resolve_block_number(relay, block_identifier).await?;
    default_gas_price(relay, &mut request).await?;

    let mut body = mirror_call_body(&request, block_number);
    body["estimate"] = json!(true);
    match relay.mirror_node.post_contract_call(&body).await {
        Ok(response) => {
            let gas = response.get("result").and_then(Value::as_str).unwrap_or("0x0");
            Ok(json!(gas))
        }
        Err(err) => translate_call_error(err),
    }
}

/// Mirror node error bodies shape as `{"_status":{"messages":[{message,detail,data}]}}`.
fn first_error_message(body: &str) -> Option<(String, String, String)> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    let entry = parsed.get("_status")?.get("messages")?.as_array()?.first()?;
    Some((
        entry.get("message").and_then(Value::as_str).unwrap_or_default().to_string(),
        entry.get("detail").and_then(Value::as_str).unwrap_or_default().to_string(),
        entry.get("data").and_then(Value::as_str).unwrap_or("0x").to_string(),
    ))
}

fn translate_call_error(err: MirrorNodeClientError) -> Result<Value, RpcErr> {
    let MirrorNodeClientError::Status { status, body, .. } = &err else {
        return Err(RpcErr::MirrorNode(err));
    };

    if *status == 400 {
        if let Some((message, detail, data)) = first_error_message(body) {
            return match message.as_str() {
                "CONTRACT_REVERTED" => Err(RpcErr::ContractRevert { data, reason: detail }),
                "INVALID_TRANSACTION" | "FAIL_INVALID" => Ok(json!("0x")),
                _ => Err(RpcErr::MirrorNode(err)),
            };
        }
        return Ok(json!("0x"));
    }

    Err(RpcErr::MirrorNode(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::Address;

    #[test]
    fn mirror_call_body_caps_gas_at_max_per_sec() {
        let request = ContractCallRequest {
            from: None,
            to: Some(Address::zero()),
            data: None,
            gas: Some(MAX_GAS_PER_SEC * 10),
            gas_price: None,
            value_tinybars: None,
        };
        let body = mirror_call_body(&request, 10);
        assert_eq!(body["gas"], json!(MAX_GAS_PER_SEC));
    }

    #[test]
    fn mirror_call_body_includes_gas_price_when_present() {
        let request = ContractCallRequest {
            from: None,
            to: Some(Address::zero()),
            data: None,
            gas: None,
            gas_price: Some(0x1234),
            value_tinybars: None,
        };
        let body = mirror_call_body(&request, 10);
        assert_eq!(body["gasPrice"], json!("0x1234"));
    }

    #[test]
    fn mirror_call_body_omits_gas_price_when_absent() {
        let request = ContractCallRequest {
            from: None,
            to: Some(Address::zero()),
            data: None,
            gas: None,
            gas_price: None,
            value_tinybars: None,
        };
        let body = mirror_call_body(&request, 10);
        assert!(body["gasPrice"].is_null());
    }
}
