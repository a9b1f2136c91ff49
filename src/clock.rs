//! Timestamps used to order session records

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Source of record timestamps (milliseconds).
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall-clock milliseconds that never repeat or go backwards within a process.
///
/// Two sessions created in the same millisecond still get distinct, ordered
/// timestamps, which the session directory depends on.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock whose first reading is greater than `floor`.
    pub fn starting_after(floor: i64) -> Self {
        Self {
            last: AtomicI64::new(floor),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> i64 {
        let wall = Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }
}
