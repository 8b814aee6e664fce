//! Pipeline configuration
//!
//! Everything here is fixed when a pipeline is constructed. A configuration is
//! validated once, up front; the running pipeline never re-checks it.

use crate::filters::{BiquadCoefficients, StageDesign};
use ecg_core::{config_error, ChannelPair, EcgError, EcgResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Sample rate of the reference design (Hz)
pub const REFERENCE_SAMPLE_RATE: f32 = 125.0;
/// Length of the calibration window in the reference design (s)
pub const REFERENCE_CALIBRATION_SECS: f32 = 5.0;

const MAX_SAMPLE_RATE: f32 = 10_000.0;

/// Filter stages of the reference design, in cascade order
pub const REFERENCE_STAGES: [StageDesign; 4] = [
    StageDesign::Highpass { cutoff_hz: 0.5 },
    StageDesign::Lowpass { cutoff_hz: 40.0 },
    StageDesign::Notch { freq_hz: 50.0, q: 30.0 },
    StageDesign::Notch { freq_hz: 60.0, q: 30.0 },
];

/// Construction-time configuration of one acquisition pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Tick rate in Hz
    pub sample_rate_hz: f32,
    /// Length of the calibration window in seconds
    pub calibration_secs: f32,
    /// Negate the raw sample of a channel before filtering
    pub invert_polarity: ChannelPair<bool>,
    /// Coefficient table shared by both channel filters, in cascade order
    pub filter_stages: Vec<BiquadCoefficients>,
    /// Linear factor applied to every lead just before emission
    pub unit_conversion: f32,
    /// Target amplitude a calibrated channel's half-swing is mapped to
    pub reference_amplitude: f32,
    /// Smallest half-swing used when computing gain
    pub amplitude_floor: f32,
}

impl PipelineConfig {
    /// The reference design: 125 Hz, 5 s calibration, four-stage cascade
    pub fn reference_design() -> Self {
        Self::designed(REFERENCE_SAMPLE_RATE, &REFERENCE_STAGES)
            .expect("reference stages are valid at the reference sample rate")
    }

    /// Identity filter cascade at `sample_rate_hz`, reference calibration
    pub fn passthrough(sample_rate_hz: f32) -> Self {
        Self {
            filter_stages: vec![BiquadCoefficients::IDENTITY; REFERENCE_STAGES.len()],
            ..Self::base(sample_rate_hz)
        }
    }

    /// Design the coefficient table from stage descriptions
    pub fn designed(sample_rate_hz: f32, stages: &[StageDesign]) -> EcgResult<Self> {
        validate_sample_rate(sample_rate_hz)?;
        let filter_stages = stages
            .iter()
            .map(|stage| stage.design(sample_rate_hz))
            .collect::<EcgResult<Vec<_>>>()?;

        Ok(Self {
            filter_stages,
            ..Self::base(sample_rate_hz)
        })
    }

    fn base(sample_rate_hz: f32) -> Self {
        Self {
            sample_rate_hz,
            calibration_secs: REFERENCE_CALIBRATION_SECS,
            invert_polarity: ChannelPair::splat(false),
            filter_stages: Vec::new(),
            unit_conversion: 1.0,
            reference_amplitude: 1.0,
            amplitude_floor: 1.0,
        }
    }

    /// Tick interval derived from the sample rate
    pub fn tick_interval(&self) -> Duration {
        Duration::from_nanos((1e9 / self.sample_rate_hz as f64).round() as u64)
    }

    /// Calibration window as a duration
    pub fn calibration_window(&self) -> Duration {
        Duration::from_secs_f64(self.calibration_secs as f64)
    }

    /// Reject anything that would make the pipeline misbehave at run time
    pub fn validate(&self) -> EcgResult<()> {
        validate_sample_rate(self.sample_rate_hz)?;

        if !(self.calibration_secs.is_finite() && self.calibration_secs > 0.0) {
            return Err(config_error!(
                "Calibration duration must be positive, got {}s",
                self.calibration_secs
            ));
        }
        if Duration::try_from_secs_f64(self.calibration_secs as f64).is_err() {
            return Err(config_error!(
                "Calibration duration {}s is out of range",
                self.calibration_secs
            ));
        }

        for (index, stage) in self.filter_stages.iter().enumerate() {
            if !stage.is_finite() {
                return Err(config_error!("Filter stage {} has non-finite coefficients", index));
            }
            if !stage.is_stable() {
                return Err(config_error!(
                    "Filter stage {} is unstable (a1={}, a2={})",
                    index,
                    stage.a1,
                    stage.a2
                ));
            }
        }

        if !self.unit_conversion.is_finite() || self.unit_conversion == 0.0 {
            return Err(config_error!(
                "Unit conversion must be finite and non-zero, got {}",
                self.unit_conversion
            ));
        }

        if !(self.reference_amplitude.is_finite() && self.reference_amplitude > 0.0) {
            return Err(config_error!(
                "Reference amplitude must be positive, got {}",
                self.reference_amplitude
            ));
        }

        if !(self.amplitude_floor.is_finite() && self.amplitude_floor > 0.0) {
            return Err(config_error!(
                "Amplitude floor must be positive, got {}",
                self.amplitude_floor
            ));
        }

        if !(self.reference_amplitude / self.amplitude_floor).is_finite() {
            return Err(config_error!(
                "Reference amplitude {} over floor {} overflows the gain",
                self.reference_amplitude,
                self.amplitude_floor
            ));
        }

        Ok(())
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> EcgResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| config_error!("Failed to serialize configuration: {}", e))
    }

    /// Import configuration from JSON and validate it
    pub fn from_json(json: &str) -> EcgResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| config_error!("Failed to deserialize configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> EcgResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| config_error!("Failed to read {}: {}", path.display(), e))?;
        Self::from_json(&json)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::reference_design()
    }
}

fn validate_sample_rate(rate: f32) -> EcgResult<()> {
    if !(rate.is_finite() && rate > 0.0 && rate <= MAX_SAMPLE_RATE) {
        return Err(EcgError::InvalidSamplingRate {
            rate,
            valid_range: format!("(0, {}]Hz", MAX_SAMPLE_RATE),
        });
    }
    Ok(())
}
