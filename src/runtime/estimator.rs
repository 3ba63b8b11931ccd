//! Elapsed-time estimation strategies
//!
//! The controller only asks "how long since the last yield?". How that is
//! answered is a tradeoff between precision and the cost of reading a clock
//! at every suspension point.

use std::cell::Cell;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::{EstimatorKind, RuntimeOpts};

/// Reports time consumed since the last [`reset`](Self::reset).
///
/// Values are monotonically non-decreasing between resets.
pub trait ElapsedTimeEstimator {
    fn elapsed_time(&self) -> Duration;

    fn reset(&self);
}

/// Build the estimator selected by `opts`.
pub fn make_estimator(opts: &RuntimeOpts) -> Box<dyn ElapsedTimeEstimator> {
    match opts.estimator {
        EstimatorKind::Exact => Box::new(ExactEstimator::new()),
        EstimatorKind::Countdown => Box::new(CountdownEstimator::new(Duration::from_millis(
            opts.time_per_elapsed_ms,
        ))),
        EstimatorKind::Velocity => Box::new(VelocityEstimator::new(Duration::from_millis(
            opts.resample_interval_ms,
        ))),
    }
}

/* ===================== Exact ===================== */

/// Reads the monotonic clock on every call.
#[derive(Debug)]
pub struct ExactEstimator {
    last_reset: Cell<Instant>,
}

impl ExactEstimator {
    pub fn new() -> Self {
        Self {
            last_reset: Cell::new(Instant::now()),
        }
    }
}

impl Default for ExactEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl ElapsedTimeEstimator for ExactEstimator {
    fn elapsed_time(&self) -> Duration {
        self.last_reset.get().elapsed()
    }

    fn reset(&self) {
        self.last_reset.set(Instant::now());
    }
}

/* ===================== Countdown ===================== */

/// Never reads a clock: each call counts as `time_per_elapsed`.
#[derive(Debug)]
pub struct CountdownEstimator {
    time_per_elapsed: Duration,
    ticks: Cell<u32>,
}

impl CountdownEstimator {
    pub fn new(time_per_elapsed: Duration) -> Self {
        Self {
            time_per_elapsed,
            ticks: Cell::new(0),
        }
    }
}

impl ElapsedTimeEstimator for CountdownEstimator {
    fn elapsed_time(&self) -> Duration {
        let ticks = self.ticks.get().saturating_add(1);
        self.ticks.set(ticks);
        self.time_per_elapsed.saturating_mul(ticks)
    }

    fn reset(&self) {
        self.ticks.set(0);
    }
}

/* ===================== Velocity ===================== */

/// Extrapolates elapsed time from the call rate, re-reading the clock only
/// once per `resample_interval` of estimated time.
#[derive(Debug)]
pub struct VelocityEstimator {
    resample_interval: Duration,
    /// Calls per millisecond, from the latest sample
    velocity: Cell<f64>,
    sample_start: Cell<Instant>,
    sample_calls: Cell<u64>,
    /// Calls since the last reset
    calls: Cell<u64>,
    last_reported: Cell<Duration>,
}

impl VelocityEstimator {
    pub fn new(resample_interval: Duration) -> Self {
        Self {
            resample_interval,
            velocity: Cell::new(1.0),
            sample_start: Cell::new(Instant::now()),
            sample_calls: Cell::new(0),
            calls: Cell::new(0),
            last_reported: Cell::new(Duration::ZERO),
        }
    }

    /// Current estimate of calls per millisecond
    pub fn velocity(&self) -> f64 {
        self.velocity.get()
    }

    fn resample(&self) {
        let now = Instant::now();
        let real_ms = now.duration_since(self.sample_start.get()).as_secs_f64() * 1000.0;
        if real_ms > 0.0 {
            self.velocity.set(self.sample_calls.get() as f64 / real_ms);
        }
        self.sample_start.set(now);
        self.sample_calls.set(0);
    }
}

impl ElapsedTimeEstimator for VelocityEstimator {
    fn elapsed_time(&self) -> Duration {
        self.calls.set(self.calls.get() + 1);
        self.sample_calls.set(self.sample_calls.get() + 1);

        let sampled_ms = self.sample_calls.get() as f64 / self.velocity.get();
        if sampled_ms >= self.resample_interval.as_secs_f64() * 1000.0 {
            self.resample();
        }

        let estimate = Duration::from_secs_f64(self.calls.get() as f64 / self.velocity.get() / 1000.0);
        // A fresh sample can lower the rate estimate; never report going backwards.
        let reported = estimate.max(self.last_reported.get());
        self.last_reported.set(reported);
        reported
    }

    fn reset(&self) {
        self.calls.set(0);
        self.last_reported.set(Duration::ZERO);
    }
}
