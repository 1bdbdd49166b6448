//! §8 scenario 3: the cache decorator's skip rule. `eth_getBalance`'s block
//! argument is declared `skip_when(1, ["latest", "pending"])`, so a call
//! tagged `"latest"` must never populate the cache while an explicit block
//! number does.

mod common;

use std::net::IpAddr;

use relay_core::{RelayConfig, RequestContext};
use serde_json::json;

#[tokio::test]
async fn latest_tag_skips_cache_but_explicit_block_populates_it() {
    let address = "0x0000000000000000000000000000000000000001";
    assert_eq!(address, common::hex_address(1), "fixture path below must match the address used in the call");
    let mock = common::spawn_mock_mirror_node(
        [("/api/v1/accounts/0x0000000000000000000000000000000000000001", json!({ "balance": { "balance": 500_000_000u64 } }))]
            .into_iter()
            .collect(),
    )
    .await;

    let config = RelayConfig::resolve(&common::base_env()).expect("config should resolve");
    let (dispatcher, _events) = common::build_dispatcher(config, Some(&mock.base_url));

    let ip: IpAddr = "127.0.0.1".parse().unwrap();
    let relay = dispatcher.relay();

    let latest_key = relay_core::cache::cache_key("eth_getBalance", &[json!(address), json!("latest")]);
    let explicit_key = relay_core::cache::cache_key("eth_getBalance", &[json!(address), json!("0x5")]);

    let latest_context = RequestContext::new(ip, "eth_getBalance");
    dispatcher
        .execute("eth_getBalance", &[json!(address), json!("latest")], ip, &latest_context)
        .await
        .expect("balance lookup against the mock should succeed");
    assert!(relay.cache.get(&latest_key).await.is_none(), "a \"latest\" call must not populate the cache");

    let explicit_context = RequestContext::new(ip, "eth_getBalance");
    dispatcher
        .execute("eth_getBalance", &[json!(address), json!("0x5")], ip, &explicit_context)
        .await
        .expect("balance lookup against the mock should succeed");
    assert!(relay.cache.get(&explicit_key).await.is_some(), "an explicit block number must populate the cache");
}
