use std::collections::VecDeque;
use tracing::trace;

/// Fixed-window moving average over the most recent valid samples.
///
/// Missing samples are never pushed, so gaps are skipped rather than
/// interpolated.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: VecDeque<f64>,
    capacity: usize,
}

impl MovingAverage {
    /// Create a smoother averaging the last `capacity` samples
    ///
    /// # Panics
    /// Panics if `capacity` is 0; configuration validation rejects that first.
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            panic!("Smoothing window must be greater than 0");
        }

        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest beyond capacity, and return the
    /// mean of the retained window
    pub fn push(&mut self, value: f64) -> f64 {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);

        let mean = self.window.iter().sum::<f64>() / self.window.len() as f64;
        trace!(
            "Smoother pushed {:.2}, window {}/{} mean {:.2}",
            value,
            self.window.len(),
            self.capacity,
            mean
        );
        mean
    }

    /// Mean of the current window, `None` when empty
    pub fn current(&self) -> Option<f64> {
        if self.window.is_empty() {
            None
        } else {
            Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}
