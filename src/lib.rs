//! Streaming statistics over sensor measurements
//!
//! This crate maintains summary statistics (count, min, max, mean, variance,
//! trend and friends) over a stream of measurements without storing the
//! measurements themselves. Each raw reading is folded into an [`Aggregate`],
//! a constant-size summary that combines associatively, so windows of any
//! size cost the same memory.
//!
//! Three queue backends trade memory for window semantics:
//! - [`DABALiteQueue`]: a true sliding window with worst-case O(1) inserts
//!   and evictions
//! - [`ContinuousSingular`]: an unbounded running total in one aggregate
//! - [`ContinuousQueue`]: an unbounded running total with logarithmically
//!   many aggregates, merged by equal mass for long-term numerical stability
//!
//! [`StatisticsComponent`] drives a queue from measurement callbacks, batches
//! measurements into chunks, publishes derived statistics on a configurable
//! cadence, and can persist the running aggregate across restarts.
//!
//! The component is single-threaded by design: all entry points take `&mut
//! self` and are expected to be called from one thread or task.

pub mod aggregate;
pub mod component;
pub mod config;
pub mod error;
pub mod queue;
pub mod snapshot;

// Re-export commonly used types
pub use aggregate::Aggregate;

pub use component::{Clock, StatisticSink, StatisticsComponent, SystemClock};

pub use config::{
    GroupType, RestoreConfig, StatisticType, StatisticsCalculationConfig, StatisticsConfig,
    WeightType, WindowConfig, WindowType,
};

pub use error::{
    QueueError, Result as StatisticsResult, SnapshotError, StatisticsError,
};

pub use queue::{AggregateQueue, ContinuousQueue, ContinuousSingular, DABALiteQueue};

pub use snapshot::{
    decode_aggregate, encode_aggregate, snapshot_key, FileSnapshotStore, MemorySnapshotStore,
    SnapshotStore, SNAPSHOT_RECORD_LEN,
};
