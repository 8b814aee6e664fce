//! Auto-calibration of baseline and gain from the initial observation window
//!
//! The engine starts in [`CalibrationPhase::Collecting`], tracking the running
//! minimum and maximum of every filtered sample. Once the shared elapsed clock
//! reaches the calibration window it fixes a baseline and gain per channel and
//! moves to [`CalibrationPhase::Calibrated`] for the rest of the run.
//!
//! A channel that has not been observed at all when the window closes would
//! otherwise calibrate from its sentinel range. The transition is deferred
//! instead: it fires on the first observation after the deadline at which
//! every channel has at least one sample on record.

use crate::config::PipelineConfig;
use ecg_core::{Channel, ChannelPair};
use std::time::Duration;
use tracing::{info, warn};

/// Calibration state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Collecting,
    Calibrated,
}

/// Per-channel calibration values as seen by the caller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSnapshot {
    pub baseline: f32,
    pub gain: f32,
    pub calibrated: bool,
}

/// Running range and fixed calibration of one channel
#[derive(Debug, Clone)]
pub struct ChannelCalibration {
    min: f32,
    max: f32,
    observations: u64,
    baseline: f32,
    gain: f32,
}

impl ChannelCalibration {
    fn new() -> Self {
        Self {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
            observations: 0,
            baseline: 0.0,
            gain: 1.0,
        }
    }

    fn record(&mut self, sample: f32) {
        self.min = self.min.min(sample);
        self.max = self.max.max(sample);
        self.observations += 1;
    }

    fn fix(&mut self, reference_amplitude: f32, amplitude_floor: f32) {
        // Halve before combining so extreme finite ranges cannot overflow
        self.baseline = self.max / 2.0 + self.min / 2.0;
        let amplitude = (self.max / 2.0 - self.min / 2.0).max(amplitude_floor);
        self.gain = reference_amplitude / amplitude;
    }

    /// Observed (min, max), if any sample has been recorded
    pub fn range(&self) -> Option<(f32, f32)> {
        (self.observations > 0).then_some((self.min, self.max))
    }

    pub fn observations(&self) -> u64 {
        self.observations
    }

    pub fn baseline(&self) -> f32 {
        self.baseline
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

/// Baseline/gain calibration for both channels of one pipeline
#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    window: Duration,
    reference_amplitude: f32,
    amplitude_floor: f32,
    phase: CalibrationPhase,
    channels: ChannelPair<ChannelCalibration>,
    elapsed: Duration,
    deferral_reported: bool,
}

impl CalibrationEngine {
    /// `reference_amplitude` and `amplitude_floor` must be positive and finite
    pub fn new(window: Duration, reference_amplitude: f32, amplitude_floor: f32) -> Self {
        Self {
            window,
            reference_amplitude,
            amplitude_floor,
            phase: CalibrationPhase::Collecting,
            channels: ChannelPair::new(ChannelCalibration::new(), ChannelCalibration::new()),
            elapsed: Duration::ZERO,
            deferral_reported: false,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.calibration_window(),
            config.reference_amplitude,
            config.amplitude_floor,
        )
    }

    /// Feed one filtered sample taken `elapsed` after pipeline start
    ///
    /// While collecting, the sample extends the channel's range. A sample that
    /// arrives at or after the deadline triggers the transition and is not
    /// itself part of the calibration range.
    pub fn observe(&mut self, channel: Channel, sample: f32, elapsed: Duration) -> CalibrationSnapshot {
        self.elapsed = self.elapsed.max(elapsed);

        if self.phase == CalibrationPhase::Collecting {
            if self.elapsed >= self.window {
                self.try_calibrate();
            }
            if self.phase == CalibrationPhase::Collecting {
                self.channels[channel].record(sample);
            }
        }

        self.snapshot(channel)
    }

    /// Map a filtered sample through the channel's calibration
    ///
    /// Identity until the engine has calibrated.
    pub fn apply(&self, channel: Channel, sample: f32) -> f32 {
        match self.phase {
            CalibrationPhase::Collecting => sample,
            CalibrationPhase::Calibrated => {
                let cal = &self.channels[channel];
                (sample - cal.baseline) * cal.gain
            }
        }
    }

    fn try_calibrate(&mut self) {
        let unobserved: Vec<Channel> = Channel::ALL
            .into_iter()
            .filter(|&ch| self.channels[ch].observations == 0)
            .collect();

        if !unobserved.is_empty() {
            if !self.deferral_reported {
                warn!(
                    ?unobserved,
                    elapsed_ms = self.elapsed.as_millis() as u64,
                    "Calibration window closed before every channel was observed, deferring"
                );
                self.deferral_reported = true;
            }
            return;
        }

        for channel in Channel::ALL {
            let cal = &mut self.channels[channel];
            cal.fix(self.reference_amplitude, self.amplitude_floor);
            info!(
                %channel,
                min = cal.min,
                max = cal.max,
                baseline = cal.baseline,
                gain = cal.gain,
                "Channel calibrated"
            );
        }
        self.phase = CalibrationPhase::Calibrated;
    }

    pub fn snapshot(&self, channel: Channel) -> CalibrationSnapshot {
        let cal = &self.channels[channel];
        CalibrationSnapshot {
            baseline: cal.baseline,
            gain: cal.gain,
            calibrated: self.is_calibrated(),
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    pub fn is_calibrated(&self) -> bool {
        self.phase == CalibrationPhase::Calibrated
    }

    pub fn channel(&self, channel: Channel) -> &ChannelCalibration {
        &self.channels[channel]
    }

    /// Latest elapsed time seen by the engine
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}
