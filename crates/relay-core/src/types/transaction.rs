use ethereum_types::{Address, U256};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::RpcErr;

pub const ZERO_ADDRESS: Address = Address::zero();

/// Normalized `eth_call`/`eth_estimateGas`/`eth_sendTransaction`-shaped request.
///
/// Construction applies every normalization rule from §3 (`ContractCallRequest`):
/// `input` wins over `data`, `value` is floor-converted from weibars to
/// tinybars, and a zero `to` is rejected up front.
#[derive(Debug, Clone, Default)]
pub struct ContractCallRequest {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub data: Option<Vec<u8>>,
    pub gas: Option<u64>,
    pub gas_price: Option<u64>,
    pub value_tinybars: Option<u64>,
}

/// The raw wire shape before normalization; mirrors what a wallet sends.
#[derive(Debug, Deserialize, Default)]
struct RawContractCallRequest {
    from: Option<String>,
    to: Option<String>,
    data: Option<String>,
    input: Option<String>,
    gas: Option<String>,
    #[serde(rename = "gasPrice")]
    gas_price: Option<String>,
    value: Option<String>,
}

/// 1 HBAR = 10^8 tinybars; Ethereum values arrive in weibars (10^18 per ether).
/// The conversion factor used here treats 1 HBAR == 1 "native" unit the same
/// way the rest of the relay's tinybar/weibar plumbing does: weibars are
/// divided down to tinybars by the fixed ratio between the two base units.
const WEIBAR_TO_TINYBAR_DIVISOR: u128 = 10_000_000_000; // 10^18 / 10^8

fn parse_hex_address(raw: &str, index: usize) -> Result<Address, RpcErr> {
    let trimmed = raw.strip_prefix("0x").unwrap_or(raw);
    if trimmed.len() != 40 {
        return Err(RpcErr::InvalidParameter {
            index,
            reason: format!("{raw} is not a 20-byte address"),
        });
    }
    trimmed.parse::<Address>().map_err(|_| RpcErr::InvalidParameter {
        index,
        reason: format!("{raw} is not a valid hex address"),
    })
}

fn parse_hex_u64(raw: &str, index: usize) -> Result<u64, RpcErr> {
    let trimmed = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(trimmed, 16).map_err(|_| RpcErr::InvalidParameter {
        index,
        reason: format!("{raw} is not a valid hex integer"),
    })
}

impl ContractCallRequest {
    pub fn parse(value: Value, index: usize, operator_address: Address) -> Result<Self, RpcErr> {
        let mut raw: RawContractCallRequest =
            serde_json::from_value(value).map_err(|err| RpcErr::InvalidParameter {
                index,
                reason: err.to_string(),
            })?;

        // `input` overrides `data`, then is dropped — see §3 ContractCallRequest.
        let data_hex = raw.input.take().or(raw.data.take());

        let to = raw
            .to
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| parse_hex_address(s, index))
            .transpose()?;
        if to == Some(ZERO_ADDRESS) {
            return Err(RpcErr::InvalidContractAddress);
        }

        let value_weibars = raw
            .value
            .as_deref()
            .map(|v| {
                let trimmed = v.strip_prefix("0x").unwrap_or(v);
                U256::from_str_radix(trimmed, 16).map_err(|_| RpcErr::InvalidParameter {
                    index,
                    reason: format!("{v} is not a valid hex value"),
                })
            })
            .transpose()?
            .unwrap_or_default();
        let value_tinybars = if value_weibars.is_zero() {
            None
        } else {
            Some((value_weibars / U256::from(WEIBAR_TO_TINYBAR_DIVISOR)).as_u64())
        };

        let from = match raw.from.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => Some(parse_hex_address(s, index)?),
            None if value_tinybars.is_some() => Some(operator_address),
            None => None,
        };

        let data = data_hex
            .as_deref()
            .map(|hex| {
                let trimmed = hex.strip_prefix("0x").unwrap_or(hex);
                hex::decode(trimmed).map_err(|_| RpcErr::InvalidParameter {
                    index,
                    reason: format!("{hex} is not valid hex call data"),
                })
            })
            .transpose()?;

        let gas = raw.gas.as_deref().map(|g| parse_hex_u64(g, index)).transpose()?;
        let gas_price = raw
            .gas_price
            .as_deref()
            .map(|g| parse_hex_u64(g, index))
            .transpose()?;

        Ok(ContractCallRequest {
            from,
            to,
            data,
            gas,
            gas_price,
            value_tinybars,
        })
    }
}

/// `CallResult = Hex(bytes)|Revert{data,reason}` (design note §9).
#[derive(Debug, Clone)]
pub enum CallResult {
    Hex(Vec<u8>),
    Revert { data: String, reason: String },
}

/// Ethereum-shaped transaction, assembled from a mirror node
/// `contracts/results/{id}` record (§4.9 Receipt/transaction service).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: ethereum_types::H256,
    pub nonce: U256,
    pub block_hash: Option<ethereum_types::H256>,
    pub block_number: Option<U256>,
    pub transaction_index: Option<U256>,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub gas: U256,
    pub gas_price: U256,
    pub input: String,
    pub chain_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn operator() -> Address {
        "0x1234567890123456789012345678901234567890"
            .parse()
            .unwrap()
    }

    #[test]
    fn input_overrides_data_and_is_removed() {
        let request = ContractCallRequest::parse(
            json!({"input": "0xaa", "data": "0xbb"}),
            0,
            operator(),
        )
        .unwrap();
        assert_eq!(request.data, Some(vec![0xaa]));
    }

    #[test]
    fn input_alone_sets_data() {
        let request = ContractCallRequest::parse(json!({"input": "0xaa"}), 0, operator()).unwrap();
        assert_eq!(request.data, Some(vec![0xaa]));
    }

    #[test]
    fn zero_address_to_is_rejected() {
        let err = ContractCallRequest::parse(
            json!({"to": "0x0000000000000000000000000000000000000000"}),
            0,
            operator(),
        )
        .unwrap_err();
        assert!(matches!(err, RpcErr::InvalidContractAddress));
    }

    #[test]
    fn missing_from_with_value_defaults_to_operator() {
        let request =
            ContractCallRequest::parse(json!({"value": "0x2540be400"}), 0, operator()).unwrap();
        assert_eq!(request.from, Some(operator()));
    }
}
