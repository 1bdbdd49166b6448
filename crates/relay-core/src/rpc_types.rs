use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{RpcErr, RpcErrorMetadata};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RpcRequestId {
    Number(u64),
    String(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcRequest {
    pub id: RpcRequestId,
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Vec<Value>>,
}

impl RpcRequest {
    pub fn new(id: RpcRequestId, method: &str, params: Option<Vec<Value>>) -> Self {
        RpcRequest {
            id,
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        }
    }

    pub fn namespace(&self) -> Result<RpcNamespace, RpcErr> {
        match self.method.split('_').next() {
            Some("eth") => Ok(RpcNamespace::Eth),
            Some("net") => Ok(RpcNamespace::Net),
            Some("web3") => Ok(RpcNamespace::Web3),
            Some("debug") => Ok(RpcNamespace::Debug),
            _ => Err(RpcErr::MethodNotFound(self.method.clone())),
        }
    }
}

pub enum RpcNamespace {
    Eth,
    Net,
    Web3,
    Debug,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcSuccessResponse {
    pub id: RpcRequestId,
    pub jsonrpc: String,
    pub result: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcErrorResponse {
    pub id: RpcRequestId,
    pub jsonrpc: String,
    pub error: RpcErrorMetadata,
}

/// Builds the final `{jsonrpc, id, result|error}` envelope for a handler outcome.
pub fn rpc_response(id: RpcRequestId, result: Result<Value, RpcErr>) -> Value {
    match result {
        Ok(result) => serde_json::to_value(RpcSuccessResponse {
            id,
            jsonrpc: "2.0".to_string(),
            result,
        }),
        Err(error) => serde_json::to_value(RpcErrorResponse {
            id,
            jsonrpc: "2.0".to_string(),
            error: error.into(),
        }),
    }
    .unwrap_or(Value::Null)
}

/// A subscription notification frame, `eth_subscription` pushed over the WS transport.
#[derive(Debug, Serialize)]
pub struct RpcSubscriptionNotification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: RpcSubscriptionParams,
}

#[derive(Debug, Serialize)]
pub struct RpcSubscriptionParams {
    pub subscription: String,
    pub result: Value,
}
