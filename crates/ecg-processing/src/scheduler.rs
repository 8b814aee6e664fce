//! Fixed-rate, drift-free tick scheduling
//!
//! Deadlines accumulate: each fired tick moves the previous deadline forward
//! by exactly one interval, never to "now". A late iteration therefore delays
//! the following tick without shifting the long-run rate, and every deadline
//! yields exactly one tick.

use crate::emitter::RecordEmitter;
use crate::pipeline::Pipeline;
use ecg_core::{ChannelSource, EcgError, EcgResult};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Monotonic time source with a blocking wait
pub trait Clock {
    /// Time since the clock's origin
    fn now(&self) -> Duration;

    /// Block until `now() >= deadline`
    fn sleep_until(&self, deadline: Duration);
}

/// Wall clock backed by [`Instant`]
///
/// Waits sleep the thread for all but the last `resolution` of the remaining
/// time and yield for the rest.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
    resolution: Duration,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::with_resolution(Duration::from_millis(1))
    }

    pub fn with_resolution(resolution: Duration) -> Self {
        Self {
            origin: Instant::now(),
            resolution,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&self, deadline: Duration) {
        loop {
            let now = self.now();
            if now >= deadline {
                return;
            }
            let remaining = deadline - now;
            if remaining > self.resolution {
                thread::sleep(remaining - self.resolution);
            } else {
                thread::yield_now();
            }
        }
    }
}

/// Manually advanced clock; clones share the same time
///
/// `sleep_until` jumps straight to the deadline.
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    nanos: Arc<AtomicU64>,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, to: Duration) {
        self.nanos.store(to.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn sleep_until(&self, deadline: Duration) {
        self.nanos
            .fetch_max(deadline.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep_until(&self, deadline: Duration) {
        (**self).sleep_until(deadline)
    }
}

/// A fired tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Zero-based tick index
    pub index: u64,
    /// Scheduled time of this tick relative to the run start
    pub scheduled: Duration,
}

/// Accumulating-deadline tick generator
#[derive(Debug, Clone)]
pub struct TickScheduler {
    interval: Duration,
    start: Duration,
    last_tick: Duration,
    fired: u64,
}

impl TickScheduler {
    /// First tick falls one interval after `start`
    pub fn new(interval: Duration, start: Duration) -> Self {
        Self {
            interval,
            start,
            last_tick: start,
            fired: 0,
        }
    }

    /// Absolute time of the next deadline
    pub fn next_deadline(&self) -> Duration {
        self.last_tick + self.interval
    }

    /// Fire at most one tick if `now` has reached the next deadline
    pub fn poll(&mut self, now: Duration) -> Option<Tick> {
        if now < self.next_deadline() {
            return None;
        }
        self.last_tick += self.interval;
        let tick = Tick {
            index: self.fired,
            scheduled: self.last_tick - self.start,
        };
        self.fired += 1;
        Some(tick)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }
}

/// How long a scheduler run lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLimit {
    Forever,
    /// Stop after this many ticks
    Ticks(u64),
    /// Stop once the clock passes this offset from the run start
    Duration(Duration),
}

/// Why a run ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    LimitReached,
    SourceExhausted,
    EmitterClosed,
    Stopped,
}

/// Timing statistics for one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    pub ticks: u64,
    /// Iterations that finished after the following deadline
    pub overruns: u64,
    /// Worst delay between a deadline and the moment its tick started
    pub max_lateness: Duration,
    pub elapsed: Duration,
}

impl SchedulerStats {
    /// Achieved tick rate over the run
    pub fn effective_rate_hz(&self) -> f64 {
        if self.elapsed.is_zero() {
            return 0.0;
        }
        self.ticks as f64 / self.elapsed.as_secs_f64()
    }
}

/// Outcome of [`SampleScheduler::run`]
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub reason: StopReason,
    pub stats: SchedulerStats,
}

/// Requests a running scheduler to stop before its next tick
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives a [`Pipeline`] at its configured rate and hands records to an emitter
pub struct SampleScheduler<C> {
    clock: C,
    limit: RunLimit,
    stop: StopHandle,
}

impl<C: Clock> SampleScheduler<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            limit: RunLimit::Forever,
            stop: StopHandle::default(),
        }
    }

    pub fn with_limit(mut self, limit: RunLimit) -> Self {
        self.limit = limit;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn limit_reached(&self, fired: u64, next_deadline: Duration, start: Duration) -> bool {
        match self.limit {
            RunLimit::Forever => false,
            RunLimit::Ticks(max) => fired >= max,
            RunLimit::Duration(horizon) => {
                next_deadline - start > horizon || self.clock.now() - start > horizon
            }
        }
    }

    /// Run until the limit, a stop request, source exhaustion or a closed emitter
    ///
    /// Any other source or emitter error ends the run with that error.
    pub fn run<S, E>(&self, pipeline: &mut Pipeline<S>, emitter: &mut E) -> EcgResult<RunSummary>
    where
        S: ChannelSource,
        E: RecordEmitter + ?Sized,
    {
        let span = pipeline.span().clone();
        let _entered = span.enter();

        let start = self.clock.now();
        let mut ticks = TickScheduler::new(pipeline.tick_interval(), start);
        let mut stats = SchedulerStats::default();

        info!(
            interval_us = ticks.interval().as_micros() as u64,
            limit = ?self.limit,
            "Sample scheduler started"
        );

        let reason = loop {
            if self.stop.is_stopped() {
                break StopReason::Stopped;
            }
            if self.limit_reached(ticks.fired(), ticks.next_deadline(), start) {
                break StopReason::LimitReached;
            }

            let deadline = ticks.next_deadline();
            self.clock.sleep_until(deadline);
            let now = self.clock.now();
            let Some(tick) = ticks.poll(now) else {
                continue;
            };
            stats.max_lateness = stats.max_lateness.max(now - deadline);

            let record = match pipeline.process_tick(tick.scheduled) {
                Ok(record) => record,
                Err(EcgError::SourceExhausted) => break StopReason::SourceExhausted,
                Err(e) => return Err(e),
            };

            match emitter.emit(tick.index, &record) {
                Ok(()) => {}
                Err(EcgError::EmitterClosed) => break StopReason::EmitterClosed,
                Err(e) => return Err(e),
            }
            stats.ticks += 1;

            let finished = self.clock.now();
            if finished > ticks.next_deadline() {
                stats.overruns += 1;
                let behind = finished - ticks.next_deadline();
                if stats.overruns == 1 {
                    warn!(
                        tick = tick.index,
                        behind_us = behind.as_micros() as u64,
                        "Tick overran its interval, next sample delayed"
                    );
                } else {
                    debug!(tick = tick.index, behind_us = behind.as_micros() as u64, "Tick overrun");
                }
            }
        };

        match emitter.flush() {
            Ok(()) | Err(EcgError::EmitterClosed) => {}
            Err(e) => return Err(e),
        }

        stats.elapsed = self.clock.now() - start;
        info!(
            ?reason,
            ticks = stats.ticks,
            overruns = stats.overruns,
            max_lateness_us = stats.max_lateness.as_micros() as u64,
            "Sample scheduler stopped"
        );

        Ok(RunSummary { reason, stats })
    }
}
