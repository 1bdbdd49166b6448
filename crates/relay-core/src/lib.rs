//! The relay's method implementations: config, JSON-RPC envelope, the mirror
//! node and SDK clients, the dispatcher and the cache/rate-limit/HBAR-budget
//! decorators wired around it.

pub mod cache;
pub mod chain_reader;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod errors;
pub mod filter;
pub mod hbar_limit;
pub mod mirror_node;
pub mod rate_limit;
pub mod relay_context;
pub mod rpc_types;
pub mod sdk_client;
pub mod services;
pub mod subscription;
pub mod types;

pub use config::RelayConfig;
pub use context::RequestContext;
pub use dispatcher::Dispatcher;
pub use errors::{RpcErr, RpcErrorMetadata};
pub use relay_context::RelayContext;
pub use rpc_types::{RpcRequest, RpcRequestId};
