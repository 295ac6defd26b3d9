//! Binary-counter continuous queue for numerically stable long-term totals

use tracing::{debug, warn};

use crate::aggregate::Aggregate;
use crate::config::WeightType;
use crate::error::{QueueError, QueueResult};

use super::AggregateQueue;

/// Largest number of slots ever needed: room for 2^32 inserts before the
/// first overflow.
const MAX_SLOTS: usize = 33;

/// Continuous window held as O(log n) aggregates merged by equal mass.
///
/// Stored aggregates carry chunk counts that behave like the bits of a binary
/// counter: inserting a chunk merges it with the most recent stored aggregate
/// while that aggregate's count is no larger, exactly like carry propagation.
/// Combines therefore happen between aggregates of comparable mass, which is
/// what keeps long-run accumulation numerically stable compared to
/// [`ContinuousSingular`](super::ContinuousSingular), at O(log n) insert and
/// query cost.
///
/// When every slot is occupied and an insert needs a new one, the whole array
/// collapses into a single aggregate. Repeated collapses erode the stability
/// benefit, so capacity should be sized generously; each collapse is logged
/// and counted in [`collapse_count`](Self::collapse_count).
#[derive(Debug, Clone)]
pub struct ContinuousQueue {
    weight_type: WeightType,
    storage: Vec<Aggregate>,
    /// Next free slot; slots below this are occupied
    index: usize,
    /// Chunks inserted since the last clear
    inserted: usize,
    collapse_count: u64,
}

impl ContinuousQueue {
    /// Create an unconfigured queue combining under `weight_type`
    pub fn new(weight_type: WeightType) -> Self {
        Self {
            weight_type,
            storage: Vec::new(),
            index: 0,
            inserted: 0,
            collapse_count: 0,
        }
    }

    /// Number of capacity overflows that collapsed the array into one slot.
    ///
    /// A nonzero value means long-term numerical stability has degraded
    /// toward that of a single running aggregate.
    pub fn collapse_count(&self) -> u64 {
        self.collapse_count
    }

    /// Combine the occupied slots below `upto`, newest first.
    ///
    /// Folding from the most recently inserted (lightest) aggregate outward
    /// keeps the weight ratios inside each combine closer to 1:1, which is
    /// the more stable direction.
    fn combine_stored(&self, upto: usize) -> Aggregate {
        let mut combined = Aggregate::identity();
        for slot in self.storage[..upto].iter().rev() {
            combined = combined.combine(slot, self.weight_type);
        }
        combined
    }
}

impl AggregateQueue for ContinuousQueue {
    fn configure(&mut self, capacity: usize) -> QueueResult<()> {
        // Capacity is the expected total number of inserts; one slot per
        // binary-counter bit covers ceil(log2(capacity)) + 1 aggregates.
        let slots = if capacity == 0 {
            MAX_SLOTS
        } else {
            let bits = usize::BITS - (capacity - 1).leading_zeros();
            (bits as usize + 1).min(MAX_SLOTS)
        };

        self.storage = Vec::new();
        self.storage
            .try_reserve_exact(slots)
            .map_err(|_| QueueError::AllocationFailed { capacity: slots })?;
        self.storage.resize(slots, Aggregate::identity());

        debug!(slots, "configured continuous queue");
        self.clear();
        Ok(())
    }

    fn clear(&mut self) {
        self.index = 0;
        self.inserted = 0;
    }

    fn evict(&mut self) {
        // An unbounded accumulator has no meaningful oldest chunk.
        self.clear();
    }

    fn insert(&mut self, chunk: Aggregate) {
        if chunk.count() == 0 {
            return;
        }

        // Carry propagation: merge while the most recent stored aggregate is
        // no heavier than the incoming one. The older side goes on the left.
        let mut aggregate = chunk;
        while self.index > 0 && self.storage[self.index - 1].count() <= aggregate.count() {
            self.index -= 1;
            aggregate = self.storage[self.index].combine(&aggregate, self.weight_type);
        }

        if self.index == self.storage.len() {
            warn!(
                slots = self.storage.len(),
                collapses = self.collapse_count + 1,
                "continuous queue capacity exceeded; collapsing into one aggregate"
            );
            let total = self
                .combine_stored(self.index)
                .combine(&aggregate, self.weight_type);
            self.collapse_count += 1;
            self.storage[0] = total;
            self.index = 1;
        } else {
            self.storage[self.index] = aggregate;
            self.index += 1;
        }

        self.inserted += 1;
    }

    fn current_aggregate(&self) -> Aggregate {
        self.combine_stored(self.index)
    }

    fn len(&self) -> usize {
        self.inserted
    }
}
