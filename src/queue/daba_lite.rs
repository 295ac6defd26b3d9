//! De-Amortized Banker's Aggregator Lite sliding-window queue
//!
//! DABA Lite maintains a sliding window of chunk aggregates with worst-case
//! O(1) insert, evict, and query using `window_size + 1` buffer slots plus
//! two scratch aggregates. Each mutation performs a small bounded amount of
//! restructuring work instead of deferring it, so no single call can be slow.
//! See "In-order sliding-window aggregation in worst-case constant time"
//! (Tangwongsan, Hirzel, Schneider) for the algorithm.
//!
//! Six circular cursors (`front`, `l`, `r`, `a`, `b`, `end`) partition the
//! buffer into logical regions: a front region whose slots hold suffix
//! aggregates ending at `b` (so the slot at `front` is the combined "alpha"
//! of everything older than the back region), and a back region `[b, end)`
//! summarized incrementally in `back_sum`. `mid_sum` carries the previous
//! back region's total while the front region is being rebuilt one step at a
//! time.

use tracing::debug;

use crate::aggregate::Aggregate;
use crate::config::WeightType;
use crate::error::{QueueError, QueueResult};

use super::index::CircularQueueIndex;
use super::AggregateQueue;

/// Sliding-window queue with worst-case O(1) operations.
#[derive(Debug, Clone)]
pub struct DABALiteQueue {
    weight_type: WeightType,
    storage: Vec<Aggregate>,

    front: CircularQueueIndex,
    l: CircularQueueIndex,
    r: CircularQueueIndex,
    a: CircularQueueIndex,
    b: CircularQueueIndex,
    end: CircularQueueIndex,

    size: usize,
    mid_sum: Aggregate,
    back_sum: Aggregate,

    /// Combines performed by insert/evict since configure; each mutation adds
    /// a bounded number regardless of window size or history
    combine_ops: u64,
}

impl DABALiteQueue {
    /// Create an unconfigured queue combining under `weight_type`
    pub fn new(weight_type: WeightType) -> Self {
        let unit = CircularQueueIndex::new(0, 1);
        Self {
            weight_type,
            storage: Vec::new(),
            front: unit,
            l: unit,
            r: unit,
            a: unit,
            b: unit,
            end: unit,
            size: 0,
            mid_sum: Aggregate::identity(),
            back_sum: Aggregate::identity(),
            combine_ops: 0,
        }
    }

    /// Total combine operations performed by insert and evict calls
    pub fn combine_ops(&self) -> u64 {
        self.combine_ops
    }

    fn combine_counted(&mut self, a: &Aggregate, b: &Aggregate) -> Aggregate {
        self.combine_ops += 1;
        a.combine(b, self.weight_type)
    }

    /// The front region is empty exactly when `b` has caught up to `front`
    fn is_front_empty(&self) -> bool {
        self.b == self.front
    }

    fn is_delta_empty(&self) -> bool {
        self.a == self.b
    }

    /// Combined aggregate of everything older than the back region
    fn alpha(&self) -> Aggregate {
        if self.is_front_empty() {
            Aggregate::identity()
        } else {
            self.storage[self.front.index()]
        }
    }

    /// Running suffix aggregate at `a`, growing backward from `b`
    fn delta(&self) -> Aggregate {
        if self.is_delta_empty() {
            Aggregate::identity()
        } else {
            self.storage[self.a.index()]
        }
    }

    /// Promote the back region to become the new middle region
    fn flip(&mut self) {
        self.l = self.front;
        self.r = self.b;
        self.a = self.end;
        self.b = self.end;
        self.mid_sum = self.back_sum;
        self.back_sum = Aggregate::identity();
    }

    /// One bounded unit of window restructuring, run after every mutation
    fn step(&mut self) {
        if self.l == self.b {
            self.flip();
        }

        if self.size > 0 {
            if self.a != self.r {
                // Extend the suffix aggregates one slot backward toward r
                let prev_delta = self.delta();
                self.a.retreat();
                let old = self.storage[self.a.index()];
                self.storage[self.a.index()] = self.combine_counted(&old, &prev_delta);
            }

            if self.l != self.r {
                // Fold the middle total into one more front slot
                let old = self.storage[self.l.index()];
                let mid_sum = self.mid_sum;
                self.storage[self.l.index()] = self.combine_counted(&old, &mid_sum);
                self.l.advance();
            } else {
                // Degenerate l == r: shift the whole middle boundary forward
                self.l.advance();
                self.r.advance();
                self.a.advance();
                self.mid_sum = self.delta();
            }
        } else {
            self.back_sum = Aggregate::identity();
            self.mid_sum = Aggregate::identity();
        }
    }
}

impl AggregateQueue for DABALiteQueue {
    fn configure(&mut self, capacity: usize) -> QueueResult<()> {
        if capacity == 0 {
            return Err(QueueError::InvalidCapacity {
                capacity,
                reason: "sliding window requires at least one chunk".to_string(),
            });
        }

        // One spare slot lets the caller insert before evicting when the
        // window is already full.
        let slots = capacity + 1;
        self.storage = Vec::new();
        self.storage
            .try_reserve_exact(slots)
            .map_err(|_| QueueError::AllocationFailed { capacity: slots })?;
        self.storage.resize(slots, Aggregate::identity());

        debug!(window_size = capacity, slots, "configured DABA Lite queue");

        let origin = CircularQueueIndex::new(0, slots);
        self.front = origin;
        self.l = origin;
        self.r = origin;
        self.a = origin;
        self.b = origin;
        self.end = origin;
        self.size = 0;
        self.mid_sum = Aggregate::identity();
        self.back_sum = Aggregate::identity();
        self.combine_ops = 0;

        Ok(())
    }

    fn clear(&mut self) {
        let origin = CircularQueueIndex::new(0, self.front.capacity());
        self.front = origin;
        self.l = origin;
        self.r = origin;
        self.a = origin;
        self.b = origin;
        self.end = origin;
        self.size = 0;
        self.mid_sum = Aggregate::identity();
        self.back_sum = Aggregate::identity();
    }

    fn evict(&mut self) {
        if self.size == 0 {
            return;
        }
        self.front.advance();
        self.size -= 1;
        self.step();
    }

    fn insert(&mut self, chunk: Aggregate) {
        if chunk.count() == 0 {
            return;
        }
        debug_assert!(
            self.size < self.storage.len(),
            "insert would overrun the window buffer; evict first"
        );

        let back_sum = self.back_sum;
        self.back_sum = self.combine_counted(&back_sum, &chunk);
        self.storage[self.end.index()] = chunk;
        self.end.advance();
        self.size += 1;
        self.step();
    }

    fn current_aggregate(&self) -> Aggregate {
        if self.size == 0 {
            return Aggregate::identity();
        }
        self.alpha().combine(&self.back_sum, self.weight_type)
    }

    fn len(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(value: f64, index: u32) -> Aggregate {
        Aggregate::from_measurement(value, 1_000, index * 1_000, 1_700_000_000 + index as i64)
    }

    fn windowed(window_size: usize) -> DABALiteQueue {
        let mut queue = DABALiteQueue::new(WeightType::Simple);
        queue.configure(window_size).unwrap();
        queue
    }

    /// Reference model: the same stream over a plain buffer of chunks.
    fn assert_matches_naive(queue: &DABALiteQueue, window: &[f64]) {
        let agg = queue.current_aggregate();
        assert_eq!(queue.len(), window.len());
        assert_eq!(agg.count(), window.len());
        if window.is_empty() {
            return;
        }
        let expected_mean = window.iter().sum::<f64>() / window.len() as f64;
        assert!(
            (agg.mean() - expected_mean).abs() < 1e-9,
            "window {window:?}: expected mean {expected_mean}, got {}",
            agg.mean()
        );
        let expected_min = window.iter().cloned().fold(f64::INFINITY, f64::min);
        let expected_max = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(agg.min(), expected_min);
        assert_eq!(agg.max(), expected_max);
    }

    #[test]
    fn test_sliding_window_of_three() {
        let mut queue = windowed(3);

        for (i, value) in [1.0, 2.0, 3.0, 4.0, 5.0].into_iter().enumerate() {
            queue.insert(chunk(value, i as u32));
            while queue.len() > 3 {
                queue.evict();
            }
        }

        let agg = queue.current_aggregate();
        assert_eq!(agg.count(), 3);
        assert!((agg.mean() - 4.0).abs() < 1e-9);
        assert_eq!(agg.min(), 3.0);
        assert_eq!(agg.max(), 5.0);
    }

    #[test]
    fn test_matches_naive_model_over_long_stream() {
        let window_size = 5;
        let mut queue = windowed(window_size);
        let mut model: Vec<f64> = Vec::new();

        for i in 0..100u32 {
            let value = ((i * 37) % 17) as f64 - 8.0;
            queue.insert(chunk(value, i));
            model.push(value);
            while queue.len() > window_size {
                queue.evict();
                model.remove(0);
            }
            assert_matches_naive(&queue, &model);
        }
    }

    #[test]
    fn test_evict_to_empty_then_reinsert() {
        let mut queue = windowed(4);
        for i in 0..4u32 {
            queue.insert(chunk(i as f64, i));
        }
        for _ in 0..4 {
            queue.evict();
        }
        assert!(queue.is_empty());
        assert_eq!(queue.current_aggregate().count(), 0);

        // Must now behave identically to a freshly configured queue
        let mut fresh = windowed(4);
        for i in 0..6u32 {
            queue.insert(chunk(i as f64 * 2.0, i));
            fresh.insert(chunk(i as f64 * 2.0, i));
            while queue.len() > 4 {
                queue.evict();
                fresh.evict();
            }
            let reused = queue.current_aggregate();
            let clean = fresh.current_aggregate();
            assert_eq!(reused.count(), clean.count());
            assert!((reused.mean() - clean.mean()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_identity_chunk_is_complete_noop() {
        let mut queue = windowed(3);
        queue.insert(chunk(7.0, 0));
        let before = queue.current_aggregate();
        let ops_before = queue.combine_ops();

        queue.insert(Aggregate::identity());

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.combine_ops(), ops_before);
        let after = queue.current_aggregate();
        assert_eq!(after.count(), before.count());
        assert_eq!(after.mean(), before.mean());
    }

    #[test]
    fn test_worst_case_constant_work_per_operation() {
        // Every single insert/evict performs a bounded number of combines
        // (one for back_sum plus at most two in step) regardless of window
        // size or history. Measured by operation counting, not wall clock.
        for window_size in [3usize, 64, 1024] {
            let mut queue = windowed(window_size);
            let mut last_ops = queue.combine_ops();

            for i in 0..(window_size as u32 * 4) {
                queue.insert(chunk(i as f64, i));
                let ops = queue.combine_ops();
                assert!(
                    ops - last_ops <= 3,
                    "insert did {} combines at window_size {window_size}",
                    ops - last_ops
                );
                last_ops = ops;

                while queue.len() > window_size {
                    queue.evict();
                    let ops = queue.combine_ops();
                    assert!(
                        ops - last_ops <= 2,
                        "evict did {} combines at window_size {window_size}",
                        ops - last_ops
                    );
                    last_ops = ops;
                }
            }
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut queue = DABALiteQueue::new(WeightType::Simple);
        assert!(matches!(
            queue.configure(0),
            Err(QueueError::InvalidCapacity { .. })
        ));
    }

    #[test]
    fn test_clear_resets_window() {
        let mut queue = windowed(3);
        for i in 0..3u32 {
            queue.insert(chunk(1.0, i));
        }
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.current_aggregate().count(), 0);

        queue.insert(chunk(9.0, 10));
        let agg = queue.current_aggregate();
        assert_eq!(agg.count(), 1);
        assert_eq!(agg.mean(), 9.0);
    }
}
