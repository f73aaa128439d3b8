//! Record id generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;

use crate::{Clock, IdGenerator};

/// Time-based id generator: the decimal count of milliseconds since the epoch,
/// bumped past the last issued value so ids stay distinct and increasing even
/// when several are issued within the same millisecond.
pub struct TimestampIds<C: Clock> {
    clock: C,
    last: AtomicU64,
}

impl<C: Clock> TimestampIds<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            last: AtomicU64::new(0),
        }
    }

    fn now_millis(&self) -> u64 {
        self.clock
            .now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

impl<C: Clock> IdGenerator for TimestampIds<C> {
    fn next_id(&self) -> String {
        let now = self.now_millis();
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or(now);
        now.max(prev + 1).to_string()
    }
}
