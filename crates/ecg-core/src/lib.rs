//! ECG-Core: Foundation types for the ECG acquisition pipeline
//!
//! Channel and lead types, the acquisition boundary trait and the shared
//! error type.

pub mod ecg_types;
pub mod error;
pub mod source;

pub use ecg_types::*;
pub use error::{EcgError, EcgResult};
pub use source::ChannelSource;
