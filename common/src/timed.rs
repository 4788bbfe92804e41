use serde::Serialize;

/// Values that can tell whether they carry usable data.
pub trait InputValue: Copy {
    fn is_usable(&self) -> bool;
}

impl InputValue for f32 {
    fn is_usable(&self) -> bool {
        !self.is_nan()
    }
}

/// An externally supplied value that goes stale `window_ms` after it was
/// last set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedInput<T> {
    value: T,
    set_at_ms: Option<u64>,
}

impl<T: InputValue> TimedInput<T> {
    /// An input that has never been set. `initial` is reported by `value()`
    /// but never counts as valid.
    pub fn new(initial: T) -> Self {
        Self {
            value: initial,
            set_at_ms: None,
        }
    }

    pub fn set(&mut self, value: T, now_ms: u64) {
        self.value = value;
        self.set_at_ms = Some(now_ms);
    }

    pub fn value(&self) -> T {
        self.value
    }

    pub fn set_at_ms(&self) -> Option<u64> {
        self.set_at_ms
    }

    pub fn is_set(&self) -> bool {
        self.set_at_ms.is_some()
    }

    pub fn is_valid(&self, now_ms: u64, window_ms: u64) -> bool {
        self.set_at_ms
            .map(|set_at| now_ms.saturating_sub(set_at) <= window_ms)
            .unwrap_or(false)
            && self.value.is_usable()
    }

    pub fn valid_value(&self, now_ms: u64, window_ms: u64) -> Option<T> {
        self.is_valid(now_ms, window_ms).then_some(self.value)
    }

    pub fn snapshot(&self, now_ms: u64, window_ms: u64) -> InputSnapshot<T> {
        InputSnapshot {
            value: self.value,
            valid: self.is_valid(now_ms, window_ms),
            age_ms: self.set_at_ms.map(|set_at| now_ms.saturating_sub(set_at)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InputSnapshot<T> {
    pub value: T,
    pub valid: bool,
    #[serde(rename = "ageMs")]
    pub age_ms: Option<u64>,
}
