// crates/scrollback-core/src/clock.rs
//
// Single monotonic timestamp source shared by every producer and by
// SyncedAVBuffer. All comparisons and windowing in the core use ticks
// from here — no wall-clock dates appear anywhere below this module.

use std::time::Instant;

/// A signed tick count from `Clock`. Comparable and orderable across
/// threads; never re-derived from wall-clock time once captured.
pub type Timestamp = i64;

/// Process-wide monotonic clock. `ticks_per_second` is fixed for the
/// life of the value — constructing a second `Clock` with a different
/// rate and mixing its timestamps with the first's would silently
/// corrupt every window comparison, so callers are expected to build
/// exactly one `Clock` at startup and share it by reference or clone.
#[derive(Clone)]
pub struct Clock {
    epoch: Instant,
    ticks_per_second: i64,
}

impl Clock {
    /// `ticks_per_second` must be positive; microsecond resolution
    /// (1_000_000) is a reasonable default for screen-capture cadences.
    pub fn new(ticks_per_second: i64) -> Result<Self, crate::error::CoreError> {
        if ticks_per_second <= 0 {
            return Err(crate::error::CoreError::ConfigInvalid(format!(
                "ticks_per_second must be positive, got {ticks_per_second}"
            )));
        }
        Ok(Self {
            epoch: Instant::now(),
            ticks_per_second,
        })
    }

    pub fn with_default_rate() -> Result<Self, crate::error::CoreError> {
        Self::new(1_000_000)
    }

    pub fn ticks_per_second(&self) -> i64 {
        self.ticks_per_second
    }

    /// Non-decreasing across threads: `Instant::now()` is monotonic per
    /// the standard library's guarantee, and we only ever subtract from
    /// a fixed epoch, never re-base it.
    pub fn now(&self) -> Timestamp {
        let elapsed = self.epoch.elapsed();
        (elapsed.as_secs_f64() * self.ticks_per_second as f64) as i64
    }

    pub fn ticks_to_seconds(&self, delta: i64) -> f64 {
        delta as f64 / self.ticks_per_second as f64
    }

    pub fn seconds_to_ticks(&self, secs: f64) -> i64 {
        (secs * self.ticks_per_second as f64) as i64
    }
}
