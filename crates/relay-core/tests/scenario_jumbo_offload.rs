//! §8 scenario 5: call data larger than the configured chunk size is
//! offloaded to HFS when jumbo transactions are disabled, and the relay's
//! pre-emptive HBAR check refuses the submission when the caller's
//! spending plan cannot cover the estimated fee.

mod common;

use std::net::IpAddr;

use ethereum_types::Address;
use relay_core::config::RelayConfig;
use relay_core::context::RequestContext;
use relay_core::hbar_limit::SubscriberType;
use relay_core::sdk_client::{EthereumTransaction, SdkClient, SdkEvent};
use serde_json::json;
use tokio::sync::mpsc;

fn config_with(overrides: &[(&str, &str)]) -> RelayConfig {
    let mut env = common::base_env();
    for (key, value) in overrides {
        env.insert(key.to_string(), value.to_string());
    }
    RelayConfig::resolve(&env).expect("config should resolve")
}

#[tokio::test]
async fn call_data_over_the_chunk_size_is_offloaded_to_a_non_empty_file() {
    let config = config_with(&[("FILE_APPEND_CHUNK_SIZE", "16"), ("JUMBO_TX_ENABLED", "false")]);
    let (events_tx, _events_rx) = mpsc::unbounded_channel::<SdkEvent>();
    let client = SdkClient::new("0.0.1001".to_string(), None, events_tx);
    let context = RequestContext::new("127.0.0.1".parse().unwrap(), "eth_sendRawTransaction");

    let raw_bytes = vec![0xabu8; 64];
    let result = client
        .submit_ethereum_transaction(raw_bytes, &context, Address::zero(), &config, 1_000, 12)
        .await
        .expect("offload and submission should succeed");

    assert!(result.file_id.is_some(), "call data over the chunk size must be offloaded to a file");

    let tx = EthereumTransaction::parse(vec![0xabu8; 64]).unwrap();
    assert!(tx.call_data_hex.len() > config.file_append_chunk_size as usize);
}

#[tokio::test]
async fn preemptive_hbar_check_refuses_jumbo_submission_over_budget() {
    let mock = common::spawn_mock_mirror_node(
        [
            (
                "/api/v1/network/fees",
                json!({ "fees": [{ "transaction_type": "EthereumTransaction", "gas": 852_000 }] }),
            ),
            (
                "/api/v1/network/exchangerate",
                json!({ "current_rate": { "cent_equivalent": 12 } }),
            ),
        ]
        .into_iter()
        .collect(),
    )
    .await;

    let config = config_with(&[("FILE_APPEND_CHUNK_SIZE", "16"), ("JUMBO_TX_ENABLED", "false")]);
    let (dispatcher, _events) = common::build_dispatcher(config, Some(&mock.base_url));
    let relay = dispatcher.relay();

    let caller = Address::zero();
    let context = RequestContext::new("127.0.0.1".parse().unwrap(), "eth_sendRawTransaction");
    let limit = SubscriberType::Basic.default_limit_tinybars();
    relay.hbar_limit.add_expense(limit - 10, caller, SubscriberType::Basic).await;

    let exceeded = relay
        .hbar_limit
        .should_limit("eth_sendRawTransaction", "EthereumTransaction", caller, &context, SubscriberType::Basic, Some(20))
        .await;
    assert!(exceeded, "a plan with less remaining budget than the estimate must be refused");

    let ip: IpAddr = "127.0.0.1".parse().unwrap();
    let raw_tx = format!("0x{}", hex::encode(vec![0xabu8; 64]));
    let rpc_context = RequestContext::new(ip, "eth_sendRawTransaction");
    let err = dispatcher
        .execute("eth_sendRawTransaction", &[json!(raw_tx)], ip, &rpc_context)
        .await
        .expect_err("the primed plan has no room left for this transaction's estimated fee");
    assert!(matches!(err, relay_core::RpcErr::HbarRateLimitExceeded));
}
