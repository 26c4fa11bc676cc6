//! Monotonic time access with explicit rollover semantics.
//!
//! The hardware counters are free-running u32 microsecond/millisecond
//! registers that wrap. All interval math in the crate goes through
//! `wrapping_sub`, so a rollover mid-interval yields the correct delta as
//! long as the interval itself is shorter than the counter period.

pub trait TimeSource {
    /// Free-running microsecond counter; wraps at `u32::MAX`.
    fn micros(&self) -> u32;

    /// Free-running millisecond counter; wraps at `u32::MAX`.
    fn millis(&self) -> u32;

    /// Busy-wait for `us` microseconds.
    fn delay_micros(&self, us: u32) {
        let start = self.micros();
        while self.micros().wrapping_sub(start) < us {
            std::hint::spin_loop();
        }
    }
}

/// Wrap-safe interval between two counter readings.
#[inline]
pub fn elapsed(start: u32, now: u32) -> u32 {
    now.wrapping_sub(start)
}

/// Tracks successive `micros()` readings and yields `dt` in seconds for the
/// cooperative main loop.
#[derive(Debug)]
pub struct DeltaTimer {
    previous_micros: u32,
}

impl DeltaTimer {
    pub fn new(now_micros: u32) -> Self {
        Self {
            previous_micros: now_micros,
        }
    }

    pub fn delta_seconds(&mut self, now_micros: u32) -> f32 {
        let elapsed_micros = elapsed(self.previous_micros, now_micros);
        self.previous_micros = now_micros;
        elapsed_micros as f32 / 1_000_000.0
    }
}
