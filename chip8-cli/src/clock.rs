//! Frame clock.
use std::{
    thread,
    time::{Duration, Instant},
};

use chip8::constants::DELAY_FREQUENCY;

/// Timer to synchronize the host loop with the 60 Hz frame rate.
///
/// Each frame runs a batch of instructions and ticks the timers once,
/// so pacing frames is enough to pace the timers.
pub(crate) struct Clock {
    last: Instant,
    frame_time: Duration,
}

impl Clock {
    pub(crate) fn new() -> Self {
        Self {
            last: Instant::now(),
            frame_time: Duration::from_nanos(1_000_000_000 / DELAY_FREQUENCY),
        }
    }

    /// Set the clock state back to zero.
    pub(crate) fn reset(&mut self) {
        self.last = Instant::now()
    }

    /// Block the current thread until the next frame.
    pub(crate) fn wait(&mut self) {
        loop {
            let elapsed = self.last.elapsed();
            if elapsed < self.frame_time {
                // Sleep resolution is too coarse for 60 Hz on some
                // platforms. Yielding keeps CPU usage reasonable.
                thread::yield_now();
            } else {
                // Don't try to catch up after a stall, carry on at
                // the usual speed.
                self.reset();
                return;
            }
        }
    }
}
