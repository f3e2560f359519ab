use std::time::{Duration, Instant};

use crate::foundation::core::Fps;

/// Wall-clock countdown state for one capture phase.
///
/// The start instant is captured only after warmup completes, so warmup
/// frames never consume countdown time. `remaining_secs` is clamped at zero
/// and, being derived from a monotonic clock, never increases.
#[derive(Clone, Copy, Debug)]
pub struct SessionClock {
    started_at: Instant,
    duration_secs: f64,
}

impl SessionClock {
    pub fn start(duration_secs: f64) -> Self {
        Self {
            started_at: Instant::now(),
            duration_secs,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    pub fn remaining_secs(&self) -> f64 {
        (self.duration_secs - self.elapsed_secs()).max(0.0)
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }
}

/// Fixed-cadence tick pacing from accumulated wall-clock deltas.
///
/// The sleep is only a hint; cadence is kept by carrying the delta
/// remainder forward (`last_tick = now - (delta % interval)`), so oversleep
/// on one tick shortens the next instead of drifting the whole session.
#[derive(Debug)]
pub(crate) struct TickPacer {
    interval: Duration,
    last_tick: Instant,
}

impl TickPacer {
    pub(crate) fn new(fps: Fps) -> Self {
        Self {
            interval: Duration::from_secs_f64(fps.frame_duration_secs()),
            last_tick: Instant::now(),
        }
    }

    /// Block until the next tick boundary and return the tick instant.
    pub(crate) fn wait_for_tick(&mut self) -> Instant {
        let now = Instant::now();
        let since_last = now.duration_since(self.last_tick);
        if since_last < self.interval {
            std::thread::sleep(self.interval - since_last);
        }

        let now = Instant::now();
        let delta = now.duration_since(self.last_tick);
        let interval_nanos = self.interval.as_nanos().max(1);
        let rem_nanos = delta.as_nanos() % interval_nanos;
        self.last_tick = now - Duration::from_nanos(rem_nanos as u64);
        now
    }
}
