//! Rectangular calibration mark on both channels

use ecg_core::{config_error, ChannelPair, ChannelSource, EcgResult};
use serde::{Deserialize, Serialize};

/// Pulse shape, in ADC counts and seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Reading at zero potential
    pub offset: f32,
    /// Pulse height above the offset (the 1 mV mark)
    pub amplitude: f32,
    /// Full on/off cycle length
    pub period_secs: f32,
    /// Fraction of the period spent high
    pub duty_cycle: f32,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            offset: 512.0,
            amplitude: 200.0,
            period_secs: 1.0,
            duty_cycle: 0.5,
        }
    }
}

/// Periodic square pulse, identical on both channels
#[derive(Debug, Clone)]
pub struct FixedCalibrationPulse {
    config: PulseConfig,
    period_samples: u64,
    high_samples: u64,
    sample_index: u64,
}

impl FixedCalibrationPulse {
    pub fn new(config: PulseConfig, sample_rate_hz: f32) -> EcgResult<Self> {
        let period_samples = (config.period_secs * sample_rate_hz).round();
        if !(period_samples.is_finite() && period_samples >= 2.0) {
            return Err(config_error!(
                "Pulse period {}s is shorter than two samples at {}Hz",
                config.period_secs,
                sample_rate_hz
            ));
        }
        if !(config.duty_cycle > 0.0 && config.duty_cycle < 1.0) {
            return Err(config_error!(
                "Duty cycle must lie strictly between 0 and 1, got {}",
                config.duty_cycle
            ));
        }

        let period_samples = period_samples as u64;
        let high_samples = ((period_samples as f32 * config.duty_cycle).round() as u64)
            .clamp(1, period_samples - 1);

        Ok(Self {
            config,
            period_samples,
            high_samples,
            sample_index: 0,
        })
    }

    fn level(&self, index: u64) -> f32 {
        if index % self.period_samples < self.high_samples {
            self.config.offset + self.config.amplitude
        } else {
            self.config.offset
        }
    }
}

impl ChannelSource for FixedCalibrationPulse {
    fn read_channels(&mut self) -> EcgResult<ChannelPair<f32>> {
        let value = self.level(self.sample_index);
        self.sample_index += 1;
        Ok(ChannelPair::splat(value))
    }

    fn name(&self) -> &str {
        "calibration-pulse"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_wave_levels() {
        let config = PulseConfig {
            offset: 100.0,
            amplitude: 50.0,
            period_secs: 0.08,
            duty_cycle: 0.25,
        };
        let mut pulse = FixedCalibrationPulse::new(config, 100.0).unwrap();

        let values: Vec<f32> = (0..16).map(|_| pulse.read_channels().unwrap().lead1).collect();
        assert_eq!(
            values,
            [150.0, 150.0, 100.0, 100.0, 100.0, 100.0, 100.0, 100.0,
             150.0, 150.0, 100.0, 100.0, 100.0, 100.0, 100.0, 100.0]
        );
    }

    #[test]
    fn test_channels_match() {
        let mut pulse = FixedCalibrationPulse::new(PulseConfig::default(), 125.0).unwrap();
        for _ in 0..300 {
            let pair = pulse.read_channels().unwrap();
            assert_eq!(pair.lead1, pair.lead2);
        }
    }

    #[test]
    fn test_rejects_degenerate_shapes() {
        let mut config = PulseConfig::default();
        config.duty_cycle = 1.0;
        assert!(FixedCalibrationPulse::new(config, 125.0).is_err());

        let mut config = PulseConfig::default();
        config.period_secs = 0.001;
        assert!(FixedCalibrationPulse::new(config, 125.0).is_err());
    }
}
