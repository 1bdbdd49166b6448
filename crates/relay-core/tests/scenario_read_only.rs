//! §8 scenario 2: read-only mode rejects mutating methods but still serves
//! read-only ones, even with no operator key configured.

mod common;

use std::net::IpAddr;

use relay_core::{RelayConfig, RequestContext, RpcErr};

#[tokio::test]
async fn read_only_allows_reads_and_rejects_writes() {
    let env = common::base_env();
    let config = RelayConfig::resolve(&env).expect("read-only config should resolve without an operator key");
    let (dispatcher, _events) = common::build_dispatcher(config, None);

    let ip: IpAddr = "127.0.0.1".parse().unwrap();

    let chain_id_context = RequestContext::new(ip, "eth_chainId");
    let chain_id = dispatcher
        .execute("eth_chainId", &[], ip, &chain_id_context)
        .await
        .expect("read-only methods still work");
    assert_eq!(chain_id, serde_json::json!("0x12a"));

    let send_context = RequestContext::new(ip, "eth_sendRawTransaction");
    let err = dispatcher
        .execute("eth_sendRawTransaction", &[serde_json::json!("0xdeadbeef")], ip, &send_context)
        .await
        .expect_err("mutating methods are refused in read-only mode");
    assert!(matches!(err, RpcErr::UnsupportedMethod(_)));
}
