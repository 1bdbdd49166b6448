use std::fmt;

use ethereum_types::H256;
use serde_json::Value;

use crate::errors::RpcErr;

/// `BlockTag = Latest|Earliest|Pending|Safe|Finalized|Number(u64)` (design note §9):
/// the dynamic `"latest"|"0x5"|...` shape at the wire boundary collapses into
/// one sum type instead of being re-parsed ad hoc by every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Earliest,
    Pending,
    Safe,
    Finalized,
    Number(u64),
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTag::Latest => write!(f, "latest"),
            BlockTag::Earliest => write!(f, "earliest"),
            BlockTag::Pending => write!(f, "pending"),
            BlockTag::Safe => write!(f, "safe"),
            BlockTag::Finalized => write!(f, "finalized"),
            BlockTag::Number(n) => write!(f, "{n:#x}"),
        }
    }
}

impl BlockTag {
    pub fn parse(value: Value, index: usize) -> Result<Self, RpcErr> {
        match value {
            Value::String(s) => match s.as_str() {
                "latest" => Ok(BlockTag::Latest),
                "earliest" => Ok(BlockTag::Earliest),
                "pending" => Ok(BlockTag::Pending),
                "safe" => Ok(BlockTag::Safe),
                "finalized" => Ok(BlockTag::Finalized),
                hex if hex.starts_with("0x") => {
                    u64::from_str_radix(&hex[2..], 16)
                        .map(BlockTag::Number)
                        .map_err(|_| RpcErr::InvalidParameter {
                            index,
                            reason: format!("{hex} is not a valid block number"),
                        })
                }
                other => Err(RpcErr::InvalidParameter {
                    index,
                    reason: format!("{other} is not a valid block tag"),
                }),
            },
            Value::Null => Ok(BlockTag::Latest),
            other => Err(RpcErr::InvalidParameter {
                index,
                reason: format!("expected a block tag string, got {other}"),
            }),
        }
    }

    /// Resolves `pending|safe|finalized` onto the current head as the spec's
    /// contract-call path requires (§4.8 step 3); `latest`/`earliest`/`Number`
    /// are resolved by the caller against the mirror node.
    pub fn resolve_against_head(self, head: u64) -> BlockTag {
        match self {
            BlockTag::Pending | BlockTag::Safe | BlockTag::Finalized => BlockTag::Number(head),
            BlockTag::Latest => BlockTag::Number(head),
            BlockTag::Earliest => BlockTag::Number(0),
            BlockTag::Number(n) => BlockTag::Number(n),
        }
    }
}

/// Either a block identifier or a block hash; used by methods whose schema
/// declares the compound type `blockNumber|blockHash`.
#[derive(Debug, Clone, Copy)]
pub enum BlockIdentifierOrHash {
    Tag(BlockTag),
    Hash(H256),
}

impl BlockIdentifierOrHash {
    pub fn parse(value: Value, index: usize) -> Result<Self, RpcErr> {
        if let Value::String(s) = &value {
            if s.starts_with("0x") && s.len() == 66 {
                return s
                    .parse::<H256>()
                    .map(BlockIdentifierOrHash::Hash)
                    .map_err(|_| RpcErr::InvalidParameter {
                        index,
                        reason: format!("{s} is not a valid block hash"),
                    });
            }
        }
        BlockTag::parse(value, index).map(BlockIdentifierOrHash::Tag)
    }
}

impl fmt::Display for BlockIdentifierOrHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockIdentifierOrHash::Tag(tag) => write!(f, "{tag}"),
            BlockIdentifierOrHash::Hash(hash) => write!(f, "{hash:#x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_tags() {
        assert_eq!(
            BlockTag::parse(Value::String("latest".into()), 0).unwrap(),
            BlockTag::Latest
        );
        assert_eq!(
            BlockTag::parse(Value::String("pending".into()), 0).unwrap(),
            BlockTag::Pending
        );
    }

    #[test]
    fn parses_hex_block_number() {
        assert_eq!(
            BlockTag::parse(Value::String("0x10".into()), 0).unwrap(),
            BlockTag::Number(16)
        );
    }

    #[test]
    fn pending_safe_finalized_resolve_to_head() {
        assert_eq!(BlockTag::Pending.resolve_against_head(42), BlockTag::Number(42));
        assert_eq!(BlockTag::Safe.resolve_against_head(42), BlockTag::Number(42));
        assert_eq!(
            BlockTag::Finalized.resolve_against_head(42),
            BlockTag::Number(42)
        );
        assert_eq!(BlockTag::Earliest.resolve_against_head(42), BlockTag::Number(0));
    }
}
