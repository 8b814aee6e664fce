//! ECG-Simulation: signal sources for the acquisition pipeline
//!
//! Synthetic beats, a calibration pulse and a line reader for externally
//! acquired samples, all behind [`ecg_core::ChannelSource`].

pub mod calibration_pulse;
pub mod ecg_simulator;
pub mod live;
pub mod source;

pub use calibration_pulse::{FixedCalibrationPulse, PulseConfig};
pub use ecg_simulator::{NoiseConfig, SyntheticConfig, SyntheticWaveform, WaveLobe};
pub use live::LiveChannelPair;
pub use source::{SignalSource, SourceConfig};
