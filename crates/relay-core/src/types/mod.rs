pub mod block;
pub mod block_identifier;
pub mod receipt;
pub mod transaction;

pub use block::{RpcBlock, RpcLog};
pub use block_identifier::{BlockIdentifierOrHash, BlockTag};
pub use receipt::RpcReceipt;
pub use transaction::{CallResult, ContractCallRequest, RpcTransaction, ZERO_ADDRESS};
