/// Typed wrapper around every way a Mirror Node REST call can fail (§7, Upstream row).
#[derive(Debug, thiserror::Error)]
pub enum MirrorNodeClientError {
    #[error("mirror node request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mirror node returned {status} for {path}: {body}")]
    Status {
        status: u16,
        path: String,
        body: String,
    },
    #[error("failed to decode mirror node response for {path}: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },
}

impl MirrorNodeClientError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, MirrorNodeClientError::Status { status, .. } if *status == 429)
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, MirrorNodeClientError::Status { status, .. } if *status == 501)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            MirrorNodeClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
