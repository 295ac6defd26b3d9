//! Modular-arithmetic index over a fixed-capacity circular buffer

/// Cursor into a circular buffer of a fixed capacity.
///
/// Advancing past the last slot wraps to 0; retreating past 0 wraps to the
/// last slot. Equality compares positions within the same capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircularQueueIndex {
    index: usize,
    capacity: usize,
}

impl CircularQueueIndex {
    /// Create a cursor at `index` over a buffer of `capacity` slots
    pub fn new(index: usize, capacity: usize) -> Self {
        debug_assert!(capacity > 0, "circular buffer capacity must be nonzero");
        debug_assert!(index < capacity, "index out of range");
        Self { index, capacity }
    }

    /// Current slot position
    pub fn index(&self) -> usize {
        self.index
    }

    /// Buffer capacity this cursor wraps over
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Move forward one slot, wrapping at capacity
    pub fn advance(&mut self) {
        self.index += 1;
        if self.index >= self.capacity {
            self.index = 0;
        }
    }

    /// Move backward one slot, wrapping at 0
    pub fn retreat(&mut self) {
        if self.index == 0 {
            self.index = self.capacity - 1;
        } else {
            self.index -= 1;
        }
    }
}
