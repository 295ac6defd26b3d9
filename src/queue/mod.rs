//! Aggregate queues: storage strategies for windows of chunk aggregates
//!
//! A queue holds the sequence of chunk [`Aggregate`]s that make up the current
//! window and can combine them into one aggregate on demand. Three backends
//! trade time, memory, and long-run numerical accuracy against each other:
//!
//! - [`ContinuousSingular`]: one running aggregate. O(1) everything, but
//!   floating-point error accumulates over very long runs.
//! - [`ContinuousQueue`]: O(log n) aggregates merged when their masses match,
//!   binary-counter style. Numerically stable long-term accumulation at
//!   O(log n) insert/query cost.
//! - [`DABALiteQueue`]: a true sliding window over a fixed circular buffer
//!   with worst-case O(1) insert, evict, and query.
//!
//! All backends execute synchronously on the calling thread; there is no
//! internal locking (see the crate docs for the threading model).

mod continuous;
mod continuous_singular;
mod daba_lite;
mod index;

pub use continuous::ContinuousQueue;
pub use continuous_singular::ContinuousSingular;
pub use daba_lite::DABALiteQueue;
pub use index::CircularQueueIndex;

use crate::aggregate::Aggregate;
use crate::error::QueueResult;

/// Storage contract for a window of chunk aggregates
pub trait AggregateQueue {
    /// Allocate backing storage for `capacity` entries.
    ///
    /// What capacity means differs by backend: the exact number of retained
    /// chunks for a sliding window, or the expected total insert count for
    /// [`ContinuousQueue`]. Allocation failure is a fatal setup error for the
    /// caller.
    fn configure(&mut self, capacity: usize) -> QueueResult<()>;

    /// Reset to the empty window
    fn clear(&mut self);

    /// Remove the influence of the oldest inserted chunk. Continuous backends
    /// have no meaningful oldest entry, so for them this equals [`clear`](Self::clear).
    fn evict(&mut self);

    /// Add a new chunk aggregate
    fn insert(&mut self, chunk: Aggregate);

    /// Combine everything currently held into one aggregate without mutating
    /// stored state
    fn current_aggregate(&self) -> Aggregate;

    /// Number of chunks inserted since the window was last empty
    fn len(&self) -> usize;

    /// Whether the window holds no chunks
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
