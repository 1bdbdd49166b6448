use serde::{Deserialize, Serialize};

use crate::mirror_node::MirrorNodeClientError;
use crate::sdk_client::SdkClientError;

/// One error type for everything the dispatcher can hand back to a caller.
///
/// Every JSON-RPC error response is built from exactly one of these variants
/// via `From<RpcErr> for RpcErrorMetadata` below; there is no second place in
/// the crate that picks a `code`/`message` pair.
#[derive(Debug)]
pub enum RpcErr {
    MethodNotFound(String),
    InvalidParameter { index: usize, reason: String },
    MissingRequiredParameter(usize),
    InvalidContractAddress,
    InvalidBlockRange,
    RequestBeyondHeadBlock,
    UnsupportedMethod(&'static str),
    IpRateLimitExceeded,
    HbarRateLimitExceeded,
    MaxSubscriptions,
    FilterNotFound,
    ContractRevert { data: String, reason: String },
    RequestTimeout,
    MirrorNode(MirrorNodeClientError),
    Sdk(SdkClientError),
    Internal(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcErrorMetadata {
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub message: String,
}

impl From<RpcErr> for RpcErrorMetadata {
    fn from(value: RpcErr) -> Self {
        match value {
            RpcErr::MethodNotFound(method) => RpcErrorMetadata {
                code: -32601,
                data: None,
                message: format!("Method not found: {method}"),
            },
            RpcErr::InvalidParameter { index, reason } => RpcErrorMetadata {
                code: -32602,
                data: None,
                message: format!("Invalid parameter {index}: {reason}"),
            },
            RpcErr::MissingRequiredParameter(index) => RpcErrorMetadata {
                code: -32602,
                data: None,
                message: format!("Missing value for required parameter {index}"),
            },
            RpcErr::InvalidContractAddress => RpcErrorMetadata {
                code: -32602,
                data: None,
                message: "Invalid Contract Address".to_string(),
            },
            RpcErr::InvalidBlockRange => RpcErrorMetadata {
                code: -32000,
                data: None,
                message: "Invalid block range".to_string(),
            },
            RpcErr::RequestBeyondHeadBlock => RpcErrorMetadata {
                code: -32000,
                data: None,
                message: "Request beyond head block".to_string(),
            },
            RpcErr::UnsupportedMethod(method) => RpcErrorMetadata {
                code: -32601,
                data: None,
                message: format!("Unsupported JSON-RPC method {method}"),
            },
            RpcErr::IpRateLimitExceeded => RpcErrorMetadata {
                code: -32605,
                data: None,
                message: "IP Rate limit exceeded".to_string(),
            },
            RpcErr::HbarRateLimitExceeded => RpcErrorMetadata {
                code: -32606,
                data: None,
                message: "HBAR Rate limit exceeded".to_string(),
            },
            RpcErr::MaxSubscriptions => RpcErrorMetadata {
                code: -32607,
                data: None,
                message: "Exceeded maximum allowed subscriptions".to_string(),
            },
            RpcErr::FilterNotFound => RpcErrorMetadata {
                code: -32001,
                data: None,
                message: "Filter not found".to_string(),
            },
            RpcErr::ContractRevert { data, reason } => RpcErrorMetadata {
                // Hand-picked to match what wallets expect from `eth_call` reverts.
                code: 3,
                data: Some(data),
                message: format!("execution reverted: {reason}"),
            },
            RpcErr::RequestTimeout => RpcErrorMetadata {
                code: -32000,
                data: None,
                message: "Request timeout".to_string(),
            },
            RpcErr::MirrorNode(err) => RpcErrorMetadata {
                code: -32000,
                data: None,
                message: format!("Mirror node error: {err}"),
            },
            RpcErr::Sdk(err) => RpcErrorMetadata {
                code: -32000,
                data: None,
                message: format!("SDK error: {err}"),
            },
            RpcErr::Internal(message) => RpcErrorMetadata {
                code: -32603,
                data: None,
                message: format!("Internal error: {message}"),
            },
        }
    }
}

impl From<serde_json::Error> for RpcErr {
    fn from(error: serde_json::Error) -> Self {
        RpcErr::InvalidParameter {
            index: 0,
            reason: error.to_string(),
        }
    }
}

impl From<MirrorNodeClientError> for RpcErr {
    fn from(value: MirrorNodeClientError) -> Self {
        RpcErr::MirrorNode(value)
    }
}

impl From<SdkClientError> for RpcErr {
    fn from(value: SdkClientError) -> Self {
        RpcErr::Sdk(value)
    }
}

/// Raised by the config registry at startup; never surfaced as a JSON-RPC response.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration key: {0}")]
    MissingRequiredKey(&'static str),
    #[error("configuration key {key} has an invalid value: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}
