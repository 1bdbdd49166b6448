use std::net::IpAddr;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Correlation data threaded through every call a single RPC invocation makes.
///
/// Created once at transport ingress and passed by reference from the
/// dispatcher down into translation services, the mirror node client and the
/// SDK client. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub ip: IpAddr,
    pub log_prefix: String,
    pub started_at: Instant,
    pub cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new(ip: IpAddr, method: &str) -> Self {
        let request_id = Uuid::new_v4();
        RequestContext {
            log_prefix: format!("[{request_id} {ip} {method}]"),
            request_id,
            ip,
            started_at: Instant::now(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_prefix_carries_ip_and_method() {
        let ctx = RequestContext::new("127.0.0.1".parse().unwrap(), "eth_chainId");
        assert!(ctx.log_prefix.contains("127.0.0.1"));
        assert!(ctx.log_prefix.contains("eth_chainId"));
    }
}
