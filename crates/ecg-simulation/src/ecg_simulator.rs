//! Synthetic ECG generator with beat morphology and realistic contamination

use ecg_core::{config_error, Channel, ChannelPair, ChannelSource, EcgResult};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// One gaussian lobe of the beat template
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveLobe {
    /// Peak height relative to the R wave
    pub amplitude: f32,
    /// Offset of the peak from the R wave (s)
    pub center: f32,
    /// Gaussian width (s)
    pub width: f32,
}

impl WaveLobe {
    const fn new(amplitude: f32, center: f32, width: f32) -> Self {
        Self {
            amplitude,
            center,
            width,
        }
    }

    fn value_at(&self, offset: f32) -> f32 {
        let d = (offset - self.center) / self.width;
        self.amplitude * (-0.5 * d * d).exp()
    }
}

/// P, Q, R, S and T lobes of a normal sinus beat
pub const SINUS_BEAT: [WaveLobe; 5] = [
    WaveLobe::new(0.12, -0.20, 0.025),
    WaveLobe::new(-0.14, -0.035, 0.010),
    WaveLobe::new(1.0, 0.0, 0.012),
    WaveLobe::new(-0.22, 0.035, 0.010),
    WaveLobe::new(0.30, 0.26, 0.045),
];

/// Time from beat start to the R peak (s)
const R_PEAK_OFFSET: f32 = 0.30;

/// Noise configuration for synthetic ECG
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Gaussian noise standard deviation in ADC counts (0.0 = no noise)
    pub gaussian_std: f32,
    /// Baseline wander amplitude in ADC counts
    pub baseline_wander: f32,
    /// Baseline wander frequency (respiration), Hz
    pub wander_freq_hz: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gaussian_std: 4.0,
            baseline_wander: 30.0,
            wander_freq_hz: 0.25,
        }
    }
}

impl NoiseConfig {
    pub fn none() -> Self {
        Self {
            gaussian_std: 0.0,
            baseline_wander: 0.0,
            wander_freq_hz: 0.25,
        }
    }
}

/// Configuration for [`SyntheticWaveform`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Heart rate in beats per minute
    pub heart_rate_bpm: f32,
    /// ADC reading at zero potential
    pub adc_offset: f32,
    /// R-wave height per channel in ADC counts
    pub r_amplitude: ChannelPair<f32>,
    pub noise: NoiseConfig,
    /// Power line interference frequency and amplitude in counts
    pub powerline: Option<(f32, f32)>,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            heart_rate_bpm: 72.0,
            adc_offset: 512.0,
            r_amplitude: ChannelPair::new(180.0, 260.0),
            noise: NoiseConfig::default(),
            powerline: Some((50.0, 8.0)),
            seed: None,
        }
    }
}

impl SyntheticConfig {
    /// Noise-free beats, deterministic
    pub fn clean() -> Self {
        Self {
            noise: NoiseConfig::none(),
            powerline: None,
            seed: Some(0),
            ..Self::default()
        }
    }
}

/// Beat-shaped synthetic ECG on both channels
pub struct SyntheticWaveform {
    config: SyntheticConfig,
    sample_rate_hz: f32,
    beat_period: f64,
    rng: StdRng,
    normal: Normal<f32>,
    sample_index: u64,
}

impl SyntheticWaveform {
    pub fn new(config: SyntheticConfig, sample_rate_hz: f32) -> EcgResult<Self> {
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(config_error!("Sample rate must be positive, got {}", sample_rate_hz));
        }
        if !(20.0..=300.0).contains(&config.heart_rate_bpm) {
            return Err(config_error!(
                "Heart rate must be within 20-300 bpm, got {}",
                config.heart_rate_bpm
            ));
        }

        if !(config.noise.gaussian_std.is_finite() && config.noise.gaussian_std >= 0.0) {
            return Err(config_error!(
                "Noise standard deviation must be finite and non-negative, got {}",
                config.noise.gaussian_std
            ));
        }

        let normal = Normal::new(0.0, config.noise.gaussian_std)
            .map_err(|e| config_error!("Failed to create normal distribution: {}", e))?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            beat_period: 60.0 / config.heart_rate_bpm as f64,
            config,
            sample_rate_hz,
            rng,
            normal,
            sample_index: 0,
        })
    }

    /// Normalised beat template value at `time` seconds (R peak = 1.0)
    pub fn beat_value(&self, time: f32) -> f32 {
        self.beat_at(time as f64)
    }

    fn beat_at(&self, time: f64) -> f32 {
        let offset = time.rem_euclid(self.beat_period) as f32 - R_PEAK_OFFSET;
        SINUS_BEAT.iter().map(|lobe| lobe.value_at(offset)).sum()
    }

    fn sample(&mut self, channel: Channel, time: f64) -> f32 {
        let mut value = self.config.adc_offset + self.config.r_amplitude[channel] * self.beat_at(time);

        let noise = &self.config.noise;
        value += noise.baseline_wander * cycle_phase(noise.wander_freq_hz, time).sin();
        if noise.gaussian_std > 0.0 {
            value += self.normal.sample(&mut self.rng);
        }

        if let Some((freq, amplitude)) = self.config.powerline {
            value += amplitude * cycle_phase(freq, time).sin();
        }

        value
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Restart from time zero
    pub fn reset_time(&mut self) {
        self.sample_index = 0;
    }
}

/// Phase in radians of a `freq_hz` sinusoid, wrapped to one cycle in f64
fn cycle_phase(freq_hz: f32, time: f64) -> f32 {
    2.0 * PI * (freq_hz as f64 * time).fract() as f32
}

impl ChannelSource for SyntheticWaveform {
    fn read_channels(&mut self) -> EcgResult<ChannelPair<f32>> {
        let time = self.sample_index as f64 / self.sample_rate_hz as f64;
        self.sample_index += 1;
        Ok(ChannelPair::new(
            self.sample(Channel::Lead1, time),
            self.sample(Channel::Lead2, time),
        ))
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
