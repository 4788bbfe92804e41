/// Simple moving average over the last `capacity` samples.
///
/// Until the buffer has filled, the average covers only the samples pushed
/// so far.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    values: Vec<f32>,
    capacity: usize,
    next: usize,
}

impl MovingAverage {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.values.len() < self.capacity {
            self.values.push(value);
        } else {
            self.values[self.next] = value;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    pub fn value(&self) -> Option<f32> {
        if self.values.is_empty() {
            return None;
        }
        // Summed in f64 so 600-sample windows don't accumulate f32 rounding.
        let sum: f64 = self.values.iter().map(|v| f64::from(*v)).sum();
        Some((sum / self.values.len() as f64) as f32)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_has_no_value() {
        let filter = MovingAverage::new(4);
        assert_eq!(filter.value(), None);
        assert!(filter.is_empty());
    }

    #[test]
    fn constant_input_converges_to_constant() {
        let mut filter = MovingAverage::new(600);
        for _ in 0..600 {
            filter.push(7.3);
        }

        assert!(filter.is_full());
        let value = filter.value().unwrap();
        assert!((value - 7.3).abs() < 1e-5);
    }

    #[test]
    fn ramp_up_averages_only_seen_samples() {
        let mut filter = MovingAverage::new(10);
        filter.push(1.0);
        filter.push(2.0);
        filter.push(6.0);

        assert_eq!(filter.len(), 3);
        assert_eq!(filter.value(), Some(3.0));
    }

    #[test]
    fn oldest_sample_is_overwritten() {
        let mut filter = MovingAverage::new(3);
        for value in [1.0, 2.0, 3.0, 10.0] {
            filter.push(value);
        }

        // Window is now [10, 2, 3].
        assert_eq!(filter.len(), 3);
        assert_eq!(filter.value(), Some(5.0));

        filter.push(20.0);
        filter.push(30.0);
        assert_eq!(filter.value(), Some(20.0));
    }

    #[test]
    fn zero_capacity_acts_as_single_slot() {
        let mut filter = MovingAverage::new(0);
        filter.push(4.0);
        filter.push(8.0);

        assert_eq!(filter.capacity(), 1);
        assert_eq!(filter.value(), Some(8.0));
    }
}
