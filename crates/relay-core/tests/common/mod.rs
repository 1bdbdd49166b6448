//! Shared fixtures for the crate-level integration tests: a minimal
//! hand-rolled HTTP mock standing in for the Mirror Node, plus a
//! `RelayContext` builder wired to it.
//!
//! The mock speaks just enough HTTP/1.1 to satisfy `reqwest` — no mocking
//! framework is part of the dependency stack, so this sticks to `tokio`'s
//! raw `TcpListener` the same way the rest of the crate avoids pulling in
//! dependencies it does not otherwise need.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ethereum_types::{Address, H256};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

use relay_core::config::RelayConfig;
use relay_core::dispatcher::Dispatcher;
use relay_core::errors::RpcErr;
use relay_core::filter::FilterChainReader;
use relay_core::mirror_node::MirrorNodeClient;
use relay_core::relay_context::RelayContext;
use relay_core::sdk_client::SdkEvent;
use relay_core::subscription::{SubscriptionChainReader, SubscriptionEvent};
use relay_core::types::{RpcBlock, RpcLog};

/// A minimal env map with just the two required keys, read-only so no
/// operator key is needed.
pub fn base_env() -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert("CHAIN_ID".to_string(), "298".to_string());
    env.insert("HEDERA_NETWORK".to_string(), "testnet".to_string());
    env.insert("READ_ONLY".to_string(), "true".to_string());
    env
}

/// A `FilterChainReader`/`SubscriptionChainReader` for scenarios that never
/// touch filters or subscriptions; any call is a test bug.
pub struct UnusedReader;

#[async_trait]
impl FilterChainReader for UnusedReader {
    async fn current_head(&self) -> Result<u64, RpcErr> {
        unreachable!("this scenario does not exercise filters")
    }

    async fn get_logs(&self, _from: u64, _to: u64, _address: Option<Address>, _topics: &[H256]) -> Result<Vec<RpcLog>, RpcErr> {
        unreachable!("this scenario does not exercise filters")
    }

    async fn get_block_hashes_since(&self, _from_block_exclusive: u64) -> Result<Vec<(u64, H256)>, RpcErr> {
        unreachable!("this scenario does not exercise filters")
    }
}

#[async_trait]
impl SubscriptionChainReader for UnusedReader {
    async fn current_head(&self) -> Result<u64, RpcErr> {
        unreachable!("this scenario does not exercise subscriptions")
    }

    async fn get_logs_since(&self, _event: &SubscriptionEvent, _since_block: u64, _head: u64) -> Result<Vec<RpcLog>, RpcErr> {
        unreachable!("this scenario does not exercise subscriptions")
    }

    async fn get_latest_block(&self) -> Result<RpcBlock, RpcErr> {
        unreachable!("this scenario does not exercise subscriptions")
    }
}

/// Builds a `Dispatcher` with a `MirrorNodeClient` pointed at `mirror_base`
/// (or nowhere, when no mock is needed) and inert filter/subscription readers.
pub fn build_dispatcher(config: RelayConfig, mirror_base: Option<&str>) -> (Dispatcher, UnboundedReceiver<SdkEvent>) {
    let urls = mirror_base
        .map(|base| vec![base.parse().expect("valid mock base url")])
        .unwrap_or_default();
    let mirror_node = MirrorNodeClient::new(urls);
    let (sdk_events_tx, sdk_events_rx) = mpsc::unbounded_channel();
    let relay = RelayContext::build(
        config,
        mirror_node,
        Address::zero(),
        None,
        sdk_events_tx,
        Arc::new(UnusedReader),
        Arc::new(UnusedReader),
    );
    (Dispatcher::new(relay), sdk_events_rx)
}

/// A hand-rolled HTTP/1.1 server: one canned JSON response per exact
/// request path (including any query string), 404 for anything else.
/// Dropping the handle aborts the accept loop.
pub struct MockMirrorNode {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl Drop for MockMirrorNode {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn_mock_mirror_node(routes: HashMap<&'static str, Value>) -> MockMirrorNode {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock mirror node listener");
    let port = listener.local_addr().expect("listener has a local addr").port();
    let routes = Arc::new(routes);

    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let mut received = Vec::new();
                loop {
                    let n = match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    received.extend_from_slice(&buf[..n]);
                    if received.windows(4).any(|window| window == b"\r\n\r\n") {
                        break;
                    }
                }

                let request = String::from_utf8_lossy(&received);
                let path = request
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();

                let (status_line, body) = match routes.get(path.as_str()) {
                    Some(value) => ("200 OK", serde_json::to_vec(value).unwrap_or_default()),
                    None => ("404 Not Found", b"{}".to_vec()),
                };
                let header = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(header.as_bytes()).await;
                let _ = stream.write_all(&body).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    MockMirrorNode {
        base_url: format!("http://127.0.0.1:{port}/"),
        handle,
    }
}

pub fn hex_address(n: u8) -> String {
    let mut bytes = [0u8; 20];
    bytes[19] = n;
    format!("{:#x}", Address::from(bytes))
}
