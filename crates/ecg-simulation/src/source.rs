//! Source selection
//!
//! The pipeline sees every variant through [`ChannelSource`]; which one runs is
//! decided once, at construction.

use crate::calibration_pulse::{FixedCalibrationPulse, PulseConfig};
use crate::ecg_simulator::{SyntheticConfig, SyntheticWaveform};
use crate::live::LiveChannelPair;
use ecg_core::{ChannelPair, ChannelSource, EcgResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Serializable choice of signal source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Synthetic(SyntheticConfig),
    CalibrationPulse(PulseConfig),
    /// Readings from a file, or stdin when `path` is absent
    Live { path: Option<PathBuf> },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Synthetic(SyntheticConfig::default())
    }
}

/// The signal source variants behind one type
pub enum SignalSource {
    Synthetic(SyntheticWaveform),
    CalibrationPulse(FixedCalibrationPulse),
    Live(LiveChannelPair),
}

impl SignalSource {
    /// Build the configured source for a pipeline ticking at `sample_rate_hz`
    pub fn from_config(config: &SourceConfig, sample_rate_hz: f32) -> EcgResult<Self> {
        let source = match config {
            SourceConfig::Synthetic(synthetic) => {
                SignalSource::Synthetic(SyntheticWaveform::new(synthetic.clone(), sample_rate_hz)?)
            }
            SourceConfig::CalibrationPulse(pulse) => SignalSource::CalibrationPulse(
                FixedCalibrationPulse::new(pulse.clone(), sample_rate_hz)?,
            ),
            SourceConfig::Live { path: Some(path) } => SignalSource::Live(LiveChannelPair::open(path)?),
            SourceConfig::Live { path: None } => SignalSource::Live(LiveChannelPair::stdin()),
        };
        info!(source = source.name(), sample_rate_hz, "Signal source ready");
        Ok(source)
    }
}

impl ChannelSource for SignalSource {
    fn read_channels(&mut self) -> EcgResult<ChannelPair<f32>> {
        match self {
            SignalSource::Synthetic(s) => s.read_channels(),
            SignalSource::CalibrationPulse(s) => s.read_channels(),
            SignalSource::Live(s) => s.read_channels(),
        }
    }

    fn name(&self) -> &str {
        match self {
            SignalSource::Synthetic(s) => s.name(),
            SignalSource::CalibrationPulse(s) => s.name(),
            SignalSource::Live(s) => s.name(),
        }
    }
}

impl From<SyntheticWaveform> for SignalSource {
    fn from(source: SyntheticWaveform) -> Self {
        SignalSource::Synthetic(source)
    }
}

impl From<FixedCalibrationPulse> for SignalSource {
    fn from(source: FixedCalibrationPulse) -> Self {
        SignalSource::CalibrationPulse(source)
    }
}

impl From<LiveChannelPair> for SignalSource {
    fn from(source: LiveChannelPair) -> Self {
        SignalSource::Live(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_config_json_selects_variant() {
        let json = r#"{"kind":"calibration_pulse","offset":0.0,"amplitude":10.0,"period_secs":0.5,"duty_cycle":0.5}"#;
        let config: SourceConfig = serde_json::from_str(json).unwrap();
        let mut source = SignalSource::from_config(&config, 100.0).unwrap();

        assert_eq!(source.name(), "calibration-pulse");
        assert_eq!(source.read_channels().unwrap(), ChannelPair::splat(10.0));
    }

    #[test]
    fn test_default_is_synthetic() {
        let mut config = SourceConfig::default();
        if let SourceConfig::Synthetic(synthetic) = &mut config {
            synthetic.seed = Some(1);
        }
        let mut source = SignalSource::from_config(&config, 125.0).unwrap();
        assert_eq!(source.name(), "synthetic");
        assert!(source.read_channels().unwrap().lead1.is_finite());
    }

    #[test]
    fn test_live_variant_through_enum() {
        let mut source = SignalSource::from(LiveChannelPair::new(Cursor::new("1 2\n"), "pipe"));
        assert_eq!(source.read_channels().unwrap(), ChannelPair::new(1.0, 2.0));
        assert!(source.read_channels().is_err());
    }

    #[test]
    fn test_missing_live_file() {
        let config = SourceConfig::Live {
            path: Some(PathBuf::from("/nonexistent/ecg.csv")),
        };
        assert!(SignalSource::from_config(&config, 125.0).is_err());
    }
}
