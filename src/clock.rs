//! Time sources for the recorder
//!
//! All times are in hectonanoseconds (100ns ticks).

use std::cell::Cell;
use std::time::Instant;

/// Hectonanoseconds per second
pub const HNSECS_PER_SEC: u64 = 10_000_000;

/// A source of hectonanosecond timestamps
///
/// Timestamps should be non-decreasing; the recorder clamps any backwards step.
pub trait Clock {
    fn now(&mut self) -> u64;
}

/// Monotonic wall clock counting hectonanoseconds since its creation
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&mut self) -> u64 {
        let elapsed = self.origin.elapsed();
        elapsed.as_secs() * HNSECS_PER_SEC + u64::from(elapsed.subsec_nanos()) / 100
    }
}

/// Manual clock: the recorder reads whatever the cell currently holds
///
/// ```
/// use std::cell::Cell;
/// use zoneprof::recorder::Recorder;
///
/// let time = Cell::new(0);
/// let mut buffer = [0u8; 1024];
/// let mut recorder = Recorder::with_clock(&mut buffer, &time);
/// let level = recorder.start_zone("frame");
/// time.set(100);
/// recorder.end_zone(level);
/// ```
impl Clock for &Cell<u64> {
    fn now(&mut self) -> u64 {
        self.get()
    }
}
