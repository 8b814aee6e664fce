//! Cascaded biquad filtering for the acquired channels

use ecg_core::{config_error, Channel, ChannelPair, EcgResult};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, SQRT_2};
use std::sync::Arc;

/// Coefficients of one second-order section
///
/// Transfer function `(b0 + b1·z⁻¹ + b2·z⁻²) / (1 + a1·z⁻¹ + a2·z⁻²)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoefficients {
    pub a1: f32,
    pub a2: f32,
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
}

impl BiquadCoefficients {
    /// Pass-through section
    pub const IDENTITY: BiquadCoefficients = BiquadCoefficients {
        a1: 0.0,
        a2: 0.0,
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
    };

    pub const fn new(a1: f32, a2: f32, b0: f32, b1: f32, b2: f32) -> Self {
        Self { a1, a2, b0, b1, b2 }
    }

    pub fn is_finite(&self) -> bool {
        [self.a1, self.a2, self.b0, self.b1, self.b2]
            .iter()
            .all(|c| c.is_finite())
    }

    /// Both poles strictly inside the unit circle (stability triangle)
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    /// Complex frequency response at `freq_hz` for sample rate `fs`
    pub fn response_at(&self, freq_hz: f32, fs: f32) -> Complex<f32> {
        let omega = 2.0 * PI * freq_hz / fs;
        let z1 = Complex::from_polar(1.0, -omega);
        let z2 = z1 * z1;

        let numerator = Complex::new(self.b0, 0.0) + z1 * self.b1 + z2 * self.b2;
        let denominator = Complex::new(1.0, 0.0) + z1 * self.a1 + z2 * self.a2;
        numerator / denominator
    }
}

/// A stage described by intent, designed for a given sample rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageDesign {
    /// 2nd order Butterworth highpass (baseline wander removal)
    Highpass { cutoff_hz: f32 },
    /// 2nd order Butterworth lowpass (muscle/HF noise removal)
    Lowpass { cutoff_hz: f32 },
    /// Notch for powerline interference
    Notch { freq_hz: f32, q: f32 },
    /// Pass-through
    Identity,
}

impl StageDesign {
    /// Design coefficients for sample rate `fs`
    pub fn design(&self, fs: f32) -> EcgResult<BiquadCoefficients> {
        match *self {
            StageDesign::Highpass { cutoff_hz } => {
                check_frequency("Highpass cutoff", cutoff_hz, fs)?;
                Ok(butterworth_highpass(cutoff_hz, fs))
            }
            StageDesign::Lowpass { cutoff_hz } => {
                check_frequency("Lowpass cutoff", cutoff_hz, fs)?;
                Ok(butterworth_lowpass(cutoff_hz, fs))
            }
            StageDesign::Notch { freq_hz, q } => {
                check_frequency("Notch frequency", freq_hz, fs)?;
                if !(q.is_finite() && q > 0.0) {
                    return Err(config_error!("Notch quality factor must be positive, got {}", q));
                }
                Ok(notch(freq_hz, q, fs))
            }
            StageDesign::Identity => Ok(BiquadCoefficients::IDENTITY),
        }
    }
}

fn check_frequency(what: &str, freq: f32, fs: f32) -> EcgResult<()> {
    if !(freq.is_finite() && freq > 0.0) {
        return Err(config_error!("{} must be positive, got {}Hz", what, freq));
    }
    if freq >= fs / 2.0 {
        return Err(config_error!(
            "{} {}Hz must be less than Nyquist frequency {}Hz",
            what,
            freq,
            fs / 2.0
        ));
    }
    Ok(())
}

fn butterworth_lowpass(cutoff: f32, fs: f32) -> BiquadCoefficients {
    // Pre-warp frequency for bilinear transform
    let omega_c = 2.0 * PI * cutoff / fs;
    let k = (omega_c / 2.0).tan();

    let k2 = k * k;
    let norm = k2 + SQRT_2 * k + 1.0;

    let b0 = k2 / norm;
    BiquadCoefficients {
        a1: (2.0 * (k2 - 1.0)) / norm,
        a2: (k2 - SQRT_2 * k + 1.0) / norm,
        b0,
        b1: 2.0 * b0,
        b2: b0,
    }
}

fn butterworth_highpass(cutoff: f32, fs: f32) -> BiquadCoefficients {
    let omega_c = 2.0 * PI * cutoff / fs;
    let k = (omega_c / 2.0).tan();

    let k2 = k * k;
    let norm = k2 + SQRT_2 * k + 1.0;

    let b0 = 1.0 / norm;
    BiquadCoefficients {
        a1: (2.0 * (k2 - 1.0)) / norm,
        a2: (k2 - SQRT_2 * k + 1.0) / norm,
        b0,
        b1: -2.0 * b0,
        b2: b0,
    }
}

fn notch(freq: f32, q: f32, fs: f32) -> BiquadCoefficients {
    let omega = 2.0 * PI * freq / fs;
    let alpha = omega.sin() / (2.0 * q);
    let cos_omega = omega.cos();

    let a0 = 1.0 + alpha;
    BiquadCoefficients {
        a1: -2.0 * cos_omega / a0,
        a2: (1.0 - alpha) / a0,
        b0: 1.0 / a0,
        b1: -2.0 * cos_omega / a0,
        b2: 1.0 / a0,
    }
}

/// Feedback memory of one section
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadState {
    pub z1: f32,
    pub z2: f32,
}

impl BiquadState {
    /// Direct form II update
    #[inline]
    pub fn process(&mut self, c: &BiquadCoefficients, input: f32) -> f32 {
        let x = input - c.a1 * self.z1 - c.a2 * self.z2;
        let output = c.b0 * x + c.b1 * self.z1 + c.b2 * self.z2;

        self.z2 = self.z1;
        self.z1 = x;

        output
    }
}

/// Fixed cascade of biquad sections for one channel
///
/// The coefficient table is shared; the state vector belongs to this channel
/// alone.
#[derive(Debug, Clone)]
pub struct ChannelFilter {
    coefficients: Arc<[BiquadCoefficients]>,
    states: Vec<BiquadState>,
}

impl ChannelFilter {
    pub fn new(coefficients: Arc<[BiquadCoefficients]>) -> Self {
        let states = vec![BiquadState::default(); coefficients.len()];
        Self {
            coefficients,
            states,
        }
    }

    /// Run one sample through every stage in order
    pub fn process(&mut self, sample: f32) -> f32 {
        self.coefficients
            .iter()
            .zip(self.states.iter_mut())
            .fold(sample, |acc, (c, state)| state.process(c, acc))
    }

    pub fn reset(&mut self) {
        self.states.fill(BiquadState::default());
    }

    pub fn stage_count(&self) -> usize {
        self.coefficients.len()
    }

    pub fn states(&self) -> &[BiquadState] {
        &self.states
    }

    /// Cascade magnitude response in dB at `freq_hz`
    pub fn magnitude_db(&self, freq_hz: f32, fs: f32) -> f32 {
        let response = self
            .coefficients
            .iter()
            .fold(Complex::new(1.0_f32, 0.0), |acc, c| acc * c.response_at(freq_hz, fs));
        20.0 * response.norm().max(f32::MIN_POSITIVE).log10()
    }
}

/// One channel filter per acquired channel, built from one coefficient table
#[derive(Debug, Clone)]
pub struct FilterBank {
    filters: ChannelPair<ChannelFilter>,
}

impl FilterBank {
    pub fn new(coefficients: &[BiquadCoefficients]) -> Self {
        let shared: Arc<[BiquadCoefficients]> = Arc::from(coefficients);
        Self {
            filters: ChannelPair::new(
                ChannelFilter::new(Arc::clone(&shared)),
                ChannelFilter::new(shared),
            ),
        }
    }

    /// Filter one raw sample of `channel`, advancing only that channel's state
    pub fn process(&mut self, channel: Channel, raw: f32) -> f32 {
        self.filters[channel].process(raw)
    }

    /// Filter a full tick; both raw reads are already complete
    pub fn process_pair(&mut self, raw: ChannelPair<f32>) -> ChannelPair<f32> {
        raw.map(|channel, sample| self.process(channel, sample))
    }

    pub fn channel(&self, channel: Channel) -> &ChannelFilter {
        &self.filters[channel]
    }

    pub fn reset(&mut self) {
        for channel in Channel::ALL {
            self.filters[channel].reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f32 = 125.0;

    #[test]
    fn test_identity_passes_through() {
        let mut bank = FilterBank::new(&[BiquadCoefficients::IDENTITY; 4]);
        for sample in [0.0, 1.5, -3.25, 1000.0] {
            assert_eq!(bank.process(Channel::Lead1, sample), sample);
        }
    }

    #[test]
    fn test_direct_form_update() {
        let c = BiquadCoefficients::new(0.5, 0.25, 1.0, 2.0, 3.0);
        let mut state = BiquadState::default();

        // x = 1, out = 1
        assert_eq!(state.process(&c, 1.0), 1.0);
        assert_eq!(state, BiquadState { z1: 1.0, z2: 0.0 });

        // x = 0 - 0.5*1 - 0.25*0 = -0.5, out = -0.5 + 2*1 + 0 = 1.5
        assert_eq!(state.process(&c, 0.0), 1.5);
        assert_eq!(state, BiquadState { z1: -0.5, z2: 1.0 });
    }

    #[test]
    fn test_channel_state_independence() {
        let table = reference_table();
        let mut bank_a = FilterBank::new(&table);
        let mut bank_b = FilterBank::new(&table);

        for i in 0..500 {
            let lead1 = (i as f32 * 0.1).sin() * 100.0;
            let out_a = bank_a.process_pair(ChannelPair::new(lead1, 0.0));
            let out_b = bank_b.process_pair(ChannelPair::new(lead1, (i * 7 % 13) as f32 * 50.0));
            assert_eq!(out_a.lead1, out_b.lead1);
        }
        assert_eq!(bank_a.channel(Channel::Lead1).states(), bank_b.channel(Channel::Lead1).states());
    }

    #[test]
    fn test_lowpass_unity_dc_gain() {
        let c = StageDesign::Lowpass { cutoff_hz: 40.0 }.design(FS).unwrap();
        assert!((c.response_at(0.0, FS).norm() - 1.0).abs() < 1e-4);
        assert!(c.is_stable());
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let c = StageDesign::Highpass { cutoff_hz: 0.5 }.design(FS).unwrap();
        assert!(c.response_at(0.0, FS).norm() < 1e-4);
        assert!((c.response_at(FS / 2.0, FS).norm() - 1.0).abs() < 1e-3);
        assert!(c.is_stable());
    }

    #[test]
    fn test_notch_rejects_powerline() {
        let c = StageDesign::Notch { freq_hz: 50.0, q: 30.0 }.design(FS).unwrap();
        let filter = ChannelFilter::new(Arc::from(vec![c]));

        assert!(filter.magnitude_db(50.0, FS) < -40.0);
        assert!(filter.magnitude_db(10.0, FS).abs() < 0.5);
    }

    #[test]
    fn test_lowpass_settles_on_constant_input() {
        let c = StageDesign::Lowpass { cutoff_hz: 40.0 }.design(FS).unwrap();
        let mut filter = ChannelFilter::new(Arc::from(vec![c, c]));

        let mut out = 0.0;
        for _ in 0..1000 {
            out = filter.process(250.0);
        }
        assert!((out - 250.0).abs() < 1e-2);
    }

    #[test]
    fn test_design_rejects_cutoff_above_nyquist() {
        assert!(StageDesign::Lowpass { cutoff_hz: 62.5 }.design(FS).is_err());
        assert!(StageDesign::Highpass { cutoff_hz: 0.0 }.design(FS).is_err());
        assert!(StageDesign::Notch { freq_hz: 50.0, q: 0.0 }.design(FS).is_err());
    }

    #[test]
    fn test_stability_triangle() {
        assert!(BiquadCoefficients::IDENTITY.is_stable());
        assert!(!BiquadCoefficients::new(0.0, 1.2, 1.0, 0.0, 0.0).is_stable());
        assert!(!BiquadCoefficients::new(-2.1, 0.5, 1.0, 0.0, 0.0).is_stable());
    }

    #[test]
    fn test_reset_zeroes_state() {
        let mut bank = FilterBank::new(&reference_table());
        bank.process(Channel::Lead2, 42.0);
        bank.reset();
        assert!(bank
            .channel(Channel::Lead2)
            .states()
            .iter()
            .all(|s| *s == BiquadState::default()));
    }

    fn reference_table() -> Vec<BiquadCoefficients> {
        [
            StageDesign::Highpass { cutoff_hz: 0.5 },
            StageDesign::Lowpass { cutoff_hz: 40.0 },
            StageDesign::Notch { freq_hz: 50.0, q: 30.0 },
            StageDesign::Notch { freq_hz: 60.0, q: 30.0 },
        ]
        .iter()
        .map(|d| d.design(FS).unwrap())
        .collect()
    }
}
