use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::{Json, Router};
use clap::Parser;
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::info;

use relay_core::dispatcher::Dispatcher;
use relay_core::hbar_limit::SubscriberType;
use relay_core::rpc_types::{rpc_response, RpcRequest, RpcRequestId};
use relay_core::sdk_client::SdkEvent;
use relay_core::{RelayConfig, RelayContext};

#[derive(Parser, Debug)]
#[command(name = "relay", about = "Ethereum JSON-RPC relay for Hedera networks")]
struct Opts {
    #[arg(
        long = "http.addr",
        default_value = "0.0.0.0",
        value_name = "ADDRESS",
        help = "Listening address for the JSON-RPC HTTP server."
    )]
    http_addr: String,
    #[arg(
        long = "http.port",
        default_value = "7546",
        value_name = "PORT",
        help = "Listening port for the JSON-RPC HTTP server."
    )]
    http_port: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RpcRequestWrapper {
    Single(RpcRequest),
    Multiple(Vec<RpcRequest>),
}

async fn handle_http_request(
    State(dispatcher): State<Arc<Dispatcher>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: String,
) -> Json<Value> {
    let response = match serde_json::from_str::<RpcRequestWrapper>(&body) {
        Ok(RpcRequestWrapper::Single(request)) => {
            let result = execute(&dispatcher, &request, addr.ip()).await;
            rpc_response(request.id, result)
        }
        Ok(RpcRequestWrapper::Multiple(requests)) => {
            let mut responses = Vec::with_capacity(requests.len());
            for request in requests {
                let result = execute(&dispatcher, &request, addr.ip()).await;
                responses.push(rpc_response(request.id, result));
            }
            Value::Array(responses)
        }
        Err(_) => rpc_response(
            RpcRequestId::String(String::new()),
            Err(relay_core::RpcErr::InvalidParameter {
                index: 0,
                reason: "invalid JSON-RPC request body".to_string(),
            }),
        ),
    };
    Json(response)
}

async fn execute(
    dispatcher: &Dispatcher,
    request: &RpcRequest,
    ip: std::net::IpAddr,
) -> Result<Value, relay_core::RpcErr> {
    let context = relay_core::RequestContext::new(ip, &request.method);
    let params = request.params.clone().unwrap_or_default();
    dispatcher.execute(&request.method, &params, ip, &context).await
}

/// Drains SDK events and, for executed transactions, charges the caller's
/// HBAR spending plan for the transaction's actual cost once the receipt is
/// available (§4.4, §4.5 step 6).
async fn account_for_sdk_events(dispatcher: Arc<Dispatcher>, mut events: mpsc::UnboundedReceiver<SdkEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SdkEvent::ExecuteTransaction {
                transaction_id,
                caller_address,
                ..
            } => {
                let relay = dispatcher.relay();
                match relay.mirror_node.get_contract_result(&transaction_id).await {
                    Ok(Some(record)) => {
                        let cost_tinybars = record
                            .get("charged_tx_fee")
                            .and_then(Value::as_u64)
                            .unwrap_or(0);
                        relay
                            .hbar_limit
                            .add_expense(cost_tinybars, caller_address, SubscriberType::Basic)
                            .await;
                    }
                    Ok(None) => {
                        tracing::warn!(%transaction_id, "no contract result found for executed transaction");
                    }
                    Err(err) => {
                        tracing::warn!(%transaction_id, %err, "failed to fetch receipt for HBAR accounting");
                    }
                }
            }
            SdkEvent::ExecuteQuery {
                constructor_name,
                caller_address,
                ..
            } => {
                tracing::debug!(constructor_name, ?caller_address, "sdk query event");
            }
        }
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let config = RelayConfig::from_env().expect("invalid relay configuration");
    info!(chain_id = %config.chain_id, hedera_network = %config.hedera_network, "starting relay");

    let operator_address = config
        .operator_id_main
        .as_deref()
        .map(relay_core::relay_context::long_zero_address)
        .unwrap_or(relay_core::types::ZERO_ADDRESS);
    let mirror_urls = relay_core::mirror_node::default_urls_for_network(&config.hedera_network);
    let mirror_node = relay_core::mirror_node::MirrorNodeClient::new(mirror_urls);
    let mirror_node_for_readers = Arc::new(relay_core::mirror_node::MirrorNodeClient::new(
        relay_core::mirror_node::default_urls_for_network(&config.hedera_network),
    ));

    let (sdk_events_tx, sdk_events_rx) = mpsc::unbounded_channel();

    let filter_reader: Arc<dyn relay_core::filter::FilterChainReader> =
        Arc::new(relay_core::chain_reader::MirrorChainReader::new(mirror_node_for_readers.clone()));
    let subscription_reader: Arc<dyn relay_core::subscription::SubscriptionChainReader> =
        Arc::new(relay_core::chain_reader::MirrorChainReader::new(mirror_node_for_readers));

    let operator_public_key = None;
    let relay = RelayContext::build(
        config,
        mirror_node,
        operator_address,
        operator_public_key,
        sdk_events_tx,
        filter_reader,
        subscription_reader,
    );
    let dispatcher = Arc::new(Dispatcher::new(relay));

    tokio::spawn(account_for_sdk_events(Arc::clone(&dispatcher), sdk_events_rx));

    let cors = CorsLayer::permissive();
    let router = Router::new()
        .route("/", axum::routing::post(handle_http_request))
        .layer(cors)
        .with_state(dispatcher);

    let addr: SocketAddr = format!("{}:{}", opts.http_addr, opts.http_port)
        .parse()
        .expect("invalid http.addr/http.port");
    let listener = TcpListener::bind(addr).await.expect("failed to bind http listener");

    info!("Starting JSON-RPC HTTP server at {addr}");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .unwrap_or_else(|err| tracing::error!(%err, "server error"));
}
