use thiserror::Error;

/// Error taxonomy for the sync engine.
///
/// The split matters for recovery policy: `Transport` failures are retried
/// with bounded backoff, `DomainRejection` carries the upstream validation
/// message and is never retried, and the reconciliation variants end up as
/// entries in the warning ledger rather than aborting a sweep.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network-level failure or 5xx from an external system. Retryable.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Structured error payload from an external system (validation failure,
    /// malformed request). Not retryable.
    #[error("Rejected by upstream: {0}")]
    DomainRejection(String),

    /// Source data violates an engine invariant before any target call.
    #[error("Sanity check failed: {0}")]
    SanityCheck(String),

    /// Source and target disagree on an existing document and the
    /// delete+recreate correction could not be applied.
    #[error("Reconciliation divergence: {0}")]
    Divergence(String),

    /// Payment-level mismatch that cannot be corrected automatically.
    #[error("Payment divergence: {0}")]
    PaymentDivergence(String),

    /// Response body did not match the expected wire shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(anyhow::Error),
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::Config(anyhow::Error::new(err))
    }
}

impl SyncError {
    /// Whether the bounded retry policy may re-attempt the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }
}
