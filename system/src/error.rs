use crate::types::Sequence;
use thiserror::Error;

#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum StoreError {
    #[error("state store unavailable: {0}")]
    Unavailable(String),
}

/// Session-scoped failures. None of them is fatal to the process.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum SyncError {
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
    /// Inbound buffer overflowed; resync with a fresh snapshot.
    #[error("update feed overrun, {skipped} updates dropped")]
    BusOverrun { skipped: u64 },
    /// Replay or live stream skipped a sequence number; resync.
    #[error("sequence gap: expected {expected}, got {found}")]
    SequenceGap { expected: Sequence, found: Sequence },
    #[error("transport closed")]
    TransportClosed,
}

impl SyncError {
    /// Whether the session recovers by re-snapshotting instead of closing.
    pub fn is_resync(&self) -> bool {
        matches!(self, Self::BusOverrun { .. } | Self::SequenceGap { .. })
    }
}
