//! Error taxonomy shared by every budgetsync crate

/// Failures surfaced by the sync engine.
///
/// The variants carry plain strings so a single result can be shared between
/// callers that coalesced onto the same in-flight fetch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// Every endpoint candidate failed. Holds one message per candidate.
    #[error("all budget endpoints failed: {}", .0.join("; "))]
    Network(Vec<String>),

    /// The server answered with a payload we could not shape into a snapshot.
    #[error("unexpected budget payload: {0}")]
    Parse(String),

    /// The interpreter found nothing actionable in a text instruction.
    #[error("no budget command recognised in {0:?}")]
    NoCommandMatched(String),

    /// The local key-value store could not be read or written.
    #[error("local budget store unavailable: {0}")]
    Persistence(String),
}

impl SyncError {
    pub fn network(message: impl Into<String>) -> Self {
        SyncError::Network(vec![message.into()])
    }

    pub fn parse(message: impl Into<String>) -> Self {
        SyncError::Parse(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        SyncError::Persistence(message.into())
    }

    /// True for failures that the read path resolves through the local fallback.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SyncError::Network(_) | SyncError::Parse(_))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Persistence(err.to_string())
    }
}
