//! `eth_getBalance`, `eth_getCode`, `eth_getStorageAt`, `eth_accounts` (§4.9 Account service).

use ethereum_types::{Address, U256};
use serde_json::{json, Value};

use crate::errors::RpcErr;
use crate::relay_context::RelayContext;
use crate::types::BlockIdentifierOrHash;

const TINYBAR_TO_WEIBAR_MULTIPLIER: u128 = 10_000_000_000; // 10^18 / 10^8

fn parse_address(value: &Value, index: usize) -> Result<Address, RpcErr> {
    value
        .as_str()
        .and_then(|s| s.strip_prefix("0x").or(Some(s)))
        .and_then(|s| s.parse::<Address>().ok())
        .ok_or_else(|| RpcErr::InvalidParameter {
            index,
            reason: "expected a 20-byte address".to_string(),
        })
}

/// `eth_getBalance(address, blockNumberOrHash)` — tinybars from the mirror
/// node converted to weibars.
pub async fn get_balance(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let address = parse_address(params.first().ok_or(RpcErr::MissingRequiredParameter(0))?, 0)?;
    let _block = params
        .get(1)
        .cloned()
        .map(|v| BlockIdentifierOrHash::parse(v, 1))
        .transpose()?;

    let account = relay
        .mirror_node
        .get_account(&format!("{address:#x}"))
        .await?;

    let tinybars = account
        .as_ref()
        .and_then(|account| account.get("balance"))
        .and_then(|balance| balance.get("balance"))
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let weibars = U256::from(tinybars) * U256::from(TINYBAR_TO_WEIBAR_MULTIPLIER);
    Ok(json!(format!("{weibars:#x}")))
}

/// `eth_getCode(address, blockNumberOrHash)` — empty for non-contract accounts.
pub async fn get_code(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let address = parse_address(params.first().ok_or(RpcErr::MissingRequiredParameter(0))?, 0)?;
    let contract = relay.mirror_node.get_contract(&format!("{address:#x}")).await?;
    let runtime_bytecode = contract
        .as_ref()
        .and_then(|contract| contract.get("runtime_bytecode"))
        .and_then(Value::as_str)
        .filter(|code| !code.is_empty() && *code != "0x")
        .unwrap_or("0x");
    Ok(json!(runtime_bytecode))
}

/// `eth_getStorageAt` — unsupported at the mirror-node layer for arbitrary
/// slots; returns the zero slot when absent (§4.9).
pub async fn get_storage_at(_relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let _address = parse_address(params.first().ok_or(RpcErr::MissingRequiredParameter(0))?, 0)?;
    Ok(json!(
        "0x0000000000000000000000000000000000000000000000000000000000000000"
    ))
}

/// The relay holds no managed keys besides the operator, so this is always empty (§4.9).
pub async fn accounts(_relay: &RelayContext, _params: &[Value]) -> Result<Value, RpcErr> {
    Ok(json!([]))
}

/// `eth_getTransactionCount(address, blockNumberOrHash)` — nonce via `accounts/{id}`.
pub async fn get_transaction_count(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let address = parse_address(params.first().ok_or(RpcErr::MissingRequiredParameter(0))?, 0)?;
    let account = relay
        .mirror_node
        .get_account(&format!("{address:#x}"))
        .await?;
    let nonce = account
        .as_ref()
        .and_then(|account| account.get("ethereum_nonce"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    Ok(json!(format!("{nonce:#x}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_address_first_parameter() {
        let err = parse_address(&json!("not-an-address"), 0).unwrap_err();
        assert!(matches!(err, RpcErr::InvalidParameter { index: 0, .. }));
    }
}
