//! Named parameter types and the validation they drive (§4.1).

use ethereum_types::{Address, H256};
use serde_json::Value;

use crate::errors::RpcErr;

#[derive(Debug, Clone, Copy)]
pub enum ParamType {
    Address,
    BlockNumber,
    BlockHash,
    BlockNumberOrHash,
    TransactionHash,
    Hex,
    Hex64,
    Transaction,
    Filter,
    TracerType,
    TracerConfig,
    Boolean,
    Array,
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub index: usize,
    pub param_type: ParamType,
    pub required: bool,
}

fn is_hex_string(value: &Value) -> bool {
    value
        .as_str()
        .map(|s| s.strip_prefix("0x").unwrap_or(s).chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

fn matches_type(value: &Value, param_type: ParamType) -> bool {
    match param_type {
        ParamType::Address => value
            .as_str()
            .map(|s| s.strip_prefix("0x").unwrap_or(s).parse::<Address>().is_ok())
            .unwrap_or(false),
        ParamType::BlockNumber => {
            value.as_str().map(|s| matches!(s, "latest" | "earliest" | "pending" | "safe" | "finalized")).unwrap_or(false)
                || is_hex_string(value)
        }
        ParamType::BlockHash => value
            .as_str()
            .map(|s| s.strip_prefix("0x").unwrap_or(s).parse::<H256>().is_ok())
            .unwrap_or(false),
        ParamType::BlockNumberOrHash => {
            matches_type(value, ParamType::BlockNumber) || matches_type(value, ParamType::BlockHash)
        }
        ParamType::TransactionHash => matches_type(value, ParamType::BlockHash),
        ParamType::Hex => is_hex_string(value),
        ParamType::Hex64 => value
            .as_str()
            .map(|s| s.strip_prefix("0x").unwrap_or(s).len() == 64 && is_hex_string(value))
            .unwrap_or(false),
        ParamType::Transaction => value.is_object(),
        ParamType::Filter => value.is_object(),
        ParamType::TracerType => value
            .as_str()
            .map(|s| matches!(s, "callTracer" | "prestateTracer" | "opcodeLogger"))
            .unwrap_or(false),
        ParamType::TracerConfig => value.is_object() || value.is_null(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Array => value.is_array(),
    }
}

/// Validates `params` against `schema`, enforcing required-ness and type.
/// A missing optional parameter is simply skipped.
pub fn validate(params: &[Value], schema: &[ParamSpec]) -> Result<(), RpcErr> {
    for spec in schema {
        match params.get(spec.index) {
            Some(value) if !value.is_null() => {
                if !matches_type(value, spec.param_type) {
                    return Err(RpcErr::InvalidParameter {
                        index: spec.index,
                        reason: format!("expected {:?}", spec.param_type),
                    });
                }
            }
            _ if spec.required => return Err(RpcErr::MissingRequiredParameter(spec.index)),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_required_parameter_is_rejected() {
        let schema = [ParamSpec { index: 0, param_type: ParamType::Address, required: true }];
        let err = validate(&[], &schema).unwrap_err();
        assert!(matches!(err, RpcErr::MissingRequiredParameter(0)));
    }

    #[test]
    fn compound_block_number_or_hash_accepts_either_variant() {
        let schema = [ParamSpec { index: 0, param_type: ParamType::BlockNumberOrHash, required: true }];
        assert!(validate(&[json!("latest")], &schema).is_ok());
        assert!(validate(
            &[json!("0x0000000000000000000000000000000000000000000000000000000000000a")],
            &schema
        )
        .is_ok());
        assert!(validate(&[json!("not-a-block")], &schema).is_err());
    }

    #[test]
    fn missing_optional_parameter_is_skipped() {
        let schema = [ParamSpec { index: 0, param_type: ParamType::Boolean, required: false }];
        assert!(validate(&[], &schema).is_ok());
    }
}
