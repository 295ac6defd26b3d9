//! Error types for the statistics engine
//!
//! All failure in this crate is either a one-time setup failure (configuration
//! or queue allocation) or a persistence failure on the snapshot path.
//! Insufficient data is never an error: derived statistics degrade to NaN, and
//! NaN measurements are silently dropped at ingestion.

use thiserror::Error;

/// Main error type for the statistics engine
#[derive(Error, Debug)]
pub enum StatisticsError {
    /// Queue storage errors
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Snapshot persistence errors
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Configuration errors
    #[error("configuration error: {source}")]
    Configuration {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Aggregate queue storage errors
#[derive(Error, Debug)]
pub enum QueueError {
    /// Backing storage for the requested capacity could not be allocated.
    /// The orchestrator treats this as a fatal setup failure.
    #[error("failed to allocate queue storage for {capacity} aggregate slots")]
    AllocationFailed { capacity: usize },

    /// Capacity is outside the range the backend supports
    #[error("invalid queue capacity: {capacity}, reason: {reason}")]
    InvalidCapacity { capacity: usize, reason: String },
}

/// Snapshot encode/decode/storage errors
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Snapshot could not be encoded
    #[error("snapshot encode failed: {0}")]
    Encode(String),

    /// Persisted bytes could not be decoded as a snapshot
    #[error("snapshot decode failed: {0}")]
    Decode(String),

    /// The backing store rejected the operation
    #[error("snapshot storage error: {0}")]
    Storage(String),

    /// I/O errors from file-backed stores
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for statistics operations
pub type Result<T> = std::result::Result<T, StatisticsError>;

/// Result type alias for queue operations
pub type QueueResult<T> = std::result::Result<T, QueueError>;

/// Result type alias for snapshot operations
pub type SnapshotResult<T> = std::result::Result<T, SnapshotError>;
