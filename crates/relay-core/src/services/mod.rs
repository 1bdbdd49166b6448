//! Translation services: one mirror-node-backed handler per `eth_*`/`net_*`/`web3_*`/`debug_*` method (§4.8, §4.9).

pub mod account;
pub mod block;
pub mod contract;
pub mod debug;
pub mod fee;
pub mod filter;
pub mod net_web3;
pub mod transaction;
