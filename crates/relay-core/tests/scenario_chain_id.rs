//! §8 scenario 1: CHAIN_ID canonicalization end to end through `Dispatcher::execute`.

mod common;

use std::net::IpAddr;

use relay_core::{RelayConfig, RequestContext};

async fn chain_id_for(raw: &str) -> String {
    let mut env = common::base_env();
    env.insert("CHAIN_ID".to_string(), raw.to_string());
    let config = RelayConfig::resolve(&env).expect("config should resolve");
    let (dispatcher, _events) = common::build_dispatcher(config, None);

    let ip: IpAddr = "127.0.0.1".parse().unwrap();
    let context = RequestContext::new(ip, "eth_chainId");
    let result = dispatcher.execute("eth_chainId", &[], ip, &context).await.unwrap();
    result.as_str().unwrap().to_string()
}

#[tokio::test]
async fn decimal_chain_id_becomes_lowercase_hex() {
    assert_eq!(chain_id_for("298").await, "0x12a");
}

#[tokio::test]
async fn non_numeric_chain_id_becomes_0x_nan() {
    assert_eq!(chain_id_for("0xhedera").await, "0xNaN");
}
