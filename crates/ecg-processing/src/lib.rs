//! ECG-Processing: the per-tick acquisition pipeline
//!
//! Biquad cascade filtering, baseline/gain auto-calibration, lead derivation,
//! record emission and the drift-free sample scheduler that drives them.

pub mod calibration;
pub mod config;
pub mod emitter;
pub mod filters;
pub mod leads;
pub mod pipeline;
pub mod scheduler;

pub use calibration::{CalibrationEngine, CalibrationPhase, CalibrationSnapshot};
pub use config::PipelineConfig;
pub use emitter::{DelimitedEmitter, JsonLinesEmitter, MemoryEmitter, RecordEmitter};
pub use filters::{BiquadCoefficients, BiquadState, ChannelFilter, FilterBank, StageDesign};
pub use leads::{derive, lead_record, DerivedLeads};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use scheduler::{
    Clock, MonotonicClock, RunLimit, RunSummary, SampleScheduler, SchedulerStats,
    SimulatedClock, StopHandle, StopReason, Tick, TickScheduler,
};
