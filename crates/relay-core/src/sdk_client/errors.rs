/// Typed wrapper around every way a consensus-node operation can fail (§3 MirrorNodeError/SdkClientError).
#[derive(Debug, thiserror::Error)]
pub enum SdkClientError {
    #[error("consensus node rejected transaction: {status}")]
    Rejected { status: String },
    #[error("wrong nonce")]
    WrongNonce,
    #[error("transaction oversize: exceeded max_chunks during file append")]
    TransactionOversize,
    #[error("created file is empty")]
    CreatedFileIsEmpty,
    #[error("request to consensus node timed out")]
    GrpcTimeout,
    #[error("connection to consensus node dropped before a response was received")]
    ConnectionDropped,
    #[error("consensus node returned no response and no error marker")]
    NullResponse,
}

impl SdkClientError {
    pub fn is_grpc_timeout(&self) -> bool {
        matches!(self, SdkClientError::GrpcTimeout)
    }

    pub fn is_connection_dropped(&self) -> bool {
        matches!(self, SdkClientError::ConnectionDropped)
    }

    /// Timeouts and dropped connections are both "transaction may still
    /// have reached consensus" cases — the caller should not blindly retry
    /// without checking a receipt first (§4.5 step 5).
    pub fn may_have_reached_consensus(&self) -> bool {
        self.is_grpc_timeout() || self.is_connection_dropped()
    }
}
