//! `debug_traceTransaction`, `debug_traceBlockBy{Number,Hash}` (§4.9 Debug service).

use serde_json::Value;

use crate::errors::RpcErr;
use crate::relay_context::RelayContext;

const SUPPORTED_TRACERS: &[&str] = &["callTracer", "prestateTracer", "opcodeLogger"];

fn tracer_type(params: &[Value], index: usize) -> Result<String, RpcErr> {
    let tracer = params
        .get(index)
        .and_then(|v| v.get("tracer"))
        .and_then(Value::as_str)
        .unwrap_or("callTracer");
    if !SUPPORTED_TRACERS.contains(&tracer) {
        return Err(RpcErr::UnsupportedMethod("debug_trace*: unsupported tracerType"));
    }
    Ok(tracer.to_string())
}

fn mirror_endpoint_for_tracer(tracer: &str) -> &'static str {
    match tracer {
        "opcodeLogger" => "opcodes",
        _ => "actions",
    }
}

pub async fn trace_transaction(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let tx_hash = params
        .first()
        .and_then(Value::as_str)
        .ok_or(RpcErr::MissingRequiredParameter(0))?;
    let tracer = tracer_type(params, 1)?;

    let path = format!(
        "api/v1/contracts/results/{tx_hash}/{}",
        mirror_endpoint_for_tracer(&tracer)
    );
    let trace: Option<Value> = relay.mirror_node.get_json(&path).await?;
    Ok(trace.unwrap_or(Value::Null))
}

async fn resolve_block_transaction_hashes(relay: &RelayContext, identifier: &str) -> Result<Vec<String>, RpcErr> {
    let block = relay.mirror_node.get_block(identifier).await?;
    Ok(block
        .and_then(|block| block.get("transactions").cloned())
        .and_then(|txs| txs.as_array().cloned())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|tx| tx.get("hash").and_then(Value::as_str).map(ToString::to_string))
        .collect())
}

pub async fn trace_block_by_number(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let number = params.first().and_then(Value::as_str).ok_or(RpcErr::MissingRequiredParameter(0))?;
    trace_block(relay, number, params).await
}

pub async fn trace_block_by_hash(relay: &RelayContext, params: &[Value]) -> Result<Value, RpcErr> {
    let hash = params.first().and_then(Value::as_str).ok_or(RpcErr::MissingRequiredParameter(0))?;
    trace_block(relay, hash, params).await
}

async fn trace_block(relay: &RelayContext, identifier: &str, params: &[Value]) -> Result<Value, RpcErr> {
    let tracer = tracer_type(params, 1)?;
    let hashes = resolve_block_transaction_hashes(relay, identifier).await?;
    let mut traces = Vec::with_capacity(hashes.len());
    for hash in hashes {
        let path = format!("api/v1/contracts/results/{hash}/{}", mirror_endpoint_for_tracer(&tracer));
        let trace: Option<Value> = relay.mirror_node.get_json(&path).await?;
        traces.push(trace.unwrap_or(Value::Null));
    }
    Ok(Value::Array(traces))
}
