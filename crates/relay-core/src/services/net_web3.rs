//! `net_*` and `web3_*` (§4.9 Net/Web3 services).

use keccak_hash::keccak;
use serde_json::{json, Value};

use crate::errors::RpcErr;
use crate::relay_context::RelayContext;

pub const RELAY_VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn net_version(relay: &RelayContext, _params: &[Value]) -> Result<Value, RpcErr> {
    Ok(json!(relay.config.chain_id.clone()))
}

pub async fn eth_chain_id(relay: &RelayContext, _params: &[Value]) -> Result<Value, RpcErr> {
    Ok(json!(relay.config.chain_id.clone()))
}

/// The relay's transport always accepts connections while the process is up (§4.9).
pub async fn net_listening(_relay: &RelayContext, _params: &[Value]) -> Result<Value, RpcErr> {
    Ok(json!(true))
}

/// Hedera has no discoverable peer set at this layer (§4.9).
pub async fn net_peer_count(_relay: &RelayContext, _params: &[Value]) -> Result<Value, RpcErr> {
    Err(RpcErr::UnsupportedMethod("net_peerCount"))
}

pub async fn web3_client_version(_relay: &RelayContext, _params: &[Value]) -> Result<Value, RpcErr> {
    Ok(json!(format!("relay/{RELAY_VERSION}")))
}

pub async fn web3_sha3(_relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let raw = params.first().and_then(Value::as_str).ok_or(RpcErr::MissingRequiredParameter(0))?;
    let trimmed = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(trimmed).map_err(|_| RpcErr::InvalidParameter {
        index: 0,
        reason: format!("{raw} is not valid hex"),
    })?;
    let hash = keccak(bytes);
    Ok(json!(format!("{:#x}", hash)))
}
