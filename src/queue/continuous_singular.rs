//! Single running aggregate for continuous windows

use crate::aggregate::Aggregate;
use crate::config::WeightType;
use crate::error::QueueResult;

use super::AggregateQueue;

/// Continuous window held in exactly one running aggregate.
///
/// Every operation is O(1) and no buffer is allocated, which makes this the
/// cheapest backend when memory and CPU matter more than very-long-run
/// numerical precision: each insert folds into the same accumulator, so
/// floating-point error grows with the total number of inserts.
#[derive(Debug, Clone)]
pub struct ContinuousSingular {
    weight_type: WeightType,
    running: Aggregate,
    inserted: usize,
}

impl ContinuousSingular {
    /// Create an unconfigured queue combining under `weight_type`
    pub fn new(weight_type: WeightType) -> Self {
        Self {
            weight_type,
            running: Aggregate::identity(),
            inserted: 0,
        }
    }
}

impl AggregateQueue for ContinuousSingular {
    fn configure(&mut self, _capacity: usize) -> QueueResult<()> {
        // No backing storage beyond the running aggregate itself.
        self.clear();
        Ok(())
    }

    fn clear(&mut self) {
        self.running = Aggregate::identity();
        self.inserted = 0;
    }

    fn evict(&mut self) {
        self.clear();
    }

    fn insert(&mut self, chunk: Aggregate) {
        // A null chunk carries no measurements and must not advance the size.
        if chunk.count() == 0 {
            return;
        }
        self.running = self.running.combine(&chunk, self.weight_type);
        self.inserted += 1;
    }

    fn current_aggregate(&self) -> Aggregate {
        self.running
    }

    fn len(&self) -> usize {
        self.inserted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(value: f64, index: u32) -> Aggregate {
        Aggregate::from_measurement(value, 1_000, index * 1_000, 1_700_000_000 + index as i64)
    }

    #[test]
    fn test_insert_accumulates() {
        let mut queue = ContinuousSingular::new(WeightType::Simple);
        queue.configure(0).unwrap();

        for (i, value) in [1.0, 2.0, 3.0].into_iter().enumerate() {
            queue.insert(chunk(value, i as u32));
        }

        let agg = queue.current_aggregate();
        assert_eq!(queue.len(), 3);
        assert_eq!(agg.count(), 3);
        assert!((agg.mean() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_evict_equals_clear() {
        let mut queue = ContinuousSingular::new(WeightType::Simple);
        queue.insert(chunk(5.0, 0));
        queue.evict();

        assert!(queue.is_empty());
        assert_eq!(queue.current_aggregate().count(), 0);
    }

    #[test]
    fn test_identity_chunk_is_complete_noop() {
        let mut queue = ContinuousSingular::new(WeightType::Simple);
        queue.insert(chunk(5.0, 0));
        queue.insert(Aggregate::identity());

        let agg = queue.current_aggregate();
        assert_eq!(queue.len(), 1);
        assert_eq!(agg.count(), 1);
        assert_eq!(agg.mean(), 5.0);
    }
}
