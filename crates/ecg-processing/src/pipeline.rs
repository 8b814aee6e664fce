//! One acquisition pipeline: source, filters, calibration and lead derivation
//!
//! A [`Pipeline`] owns every piece of mutable state for one run. Nothing is
//! process-wide, so several pipelines can run side by side.

use crate::calibration::{CalibrationEngine, CalibrationSnapshot};
use crate::config::PipelineConfig;
use crate::filters::FilterBank;
use crate::leads::lead_record;
use ecg_core::{Channel, ChannelPair, ChannelSource, EcgResult, LeadRecord, SessionId};
use std::time::Duration;
use tracing::{info, info_span, Span};

/// Acquisition pipeline driven one tick at a time
pub struct Pipeline<S> {
    session: SessionId,
    name: String,
    config: PipelineConfig,
    source: S,
    filters: FilterBank,
    calibration: CalibrationEngine,
    ticks: u64,
    span: Span,
}

/// Builder for [`Pipeline`]
pub struct PipelineBuilder<S> {
    config: PipelineConfig,
    source: S,
    name: Option<String>,
    session: Option<SessionId>,
}

impl<S: ChannelSource> PipelineBuilder<S> {
    pub fn new(config: PipelineConfig, source: S) -> Self {
        Self {
            config,
            source,
            name: None,
            session: None,
        }
    }

    /// Name shown in logs, defaults to the source name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    /// Validate the configuration and assemble the pipeline
    pub fn build(self) -> EcgResult<Pipeline<S>> {
        self.config.validate()?;

        let session = self.session.unwrap_or_default();
        let name = self.name.unwrap_or_else(|| self.source.name().to_string());
        let span = info_span!("pipeline", %session, name = %name);

        let filters = FilterBank::new(&self.config.filter_stages);
        let calibration = CalibrationEngine::from_config(&self.config);

        span.in_scope(|| {
            info!(
                source = self.source.name(),
                sample_rate_hz = self.config.sample_rate_hz,
                calibration_secs = self.config.calibration_secs,
                stages = self.config.filter_stages.len(),
                "Pipeline created"
            )
        });

        Ok(Pipeline {
            session,
            name,
            config: self.config,
            source: self.source,
            filters,
            calibration,
            ticks: 0,
            span,
        })
    }
}

impl<S: ChannelSource> Pipeline<S> {
    /// Build with defaults for everything but config and source
    pub fn new(config: PipelineConfig, source: S) -> EcgResult<Self> {
        PipelineBuilder::new(config, source).build()
    }

    pub fn builder(config: PipelineConfig, source: S) -> PipelineBuilder<S> {
        PipelineBuilder::new(config, source)
    }

    /// Run one full iteration for the tick scheduled `elapsed` after start
    ///
    /// Both raw channels are read before either is filtered. Source errors
    /// leave filter and calibration state untouched.
    pub fn process_tick(&mut self, elapsed: Duration) -> EcgResult<LeadRecord> {
        let raw = self.source.read_channels()?;

        let oriented = raw.map(|channel, sample| {
            if self.config.invert_polarity[channel] {
                -sample
            } else {
                sample
            }
        });

        let filtered = self.filters.process_pair(oriented);

        let calibration = &mut self.calibration;
        let calibrated = filtered.map(|channel, sample| {
            calibration.observe(channel, sample, elapsed);
            calibration.apply(channel, sample)
        });

        self.ticks += 1;
        Ok(lead_record(calibrated).scaled(self.config.unit_conversion))
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tick_interval(&self) -> Duration {
        self.config.tick_interval()
    }

    /// Ticks processed so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_calibrated()
    }

    /// Current baseline/gain of both channels
    pub fn calibration(&self) -> ChannelPair<CalibrationSnapshot> {
        ChannelPair::new(
            self.calibration.snapshot(Channel::Lead1),
            self.calibration.snapshot(Channel::Lead2),
        )
    }

    pub fn filters(&self) -> &FilterBank {
        &self.filters
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Tracing span carrying the session id
    pub fn span(&self) -> &Span {
        &self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::BiquadCoefficients;
    use ecg_core::EcgError;

    struct Constant(ChannelPair<f32>);

    impl ChannelSource for Constant {
        fn read_channels(&mut self) -> EcgResult<ChannelPair<f32>> {
            Ok(self.0)
        }

        fn name(&self) -> &str {
            "constant"
        }
    }

    struct Failing;

    impl ChannelSource for Failing {
        fn read_channels(&mut self) -> EcgResult<ChannelPair<f32>> {
            Err(EcgError::SourceError {
                message: "adc timeout".to_string(),
            })
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::passthrough(100.0);
        config.calibration_secs = 0.1;
        config
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut bad = config();
        bad.sample_rate_hz = 0.0;
        assert!(Pipeline::new(bad, Constant(ChannelPair::splat(0.0))).is_err());

        let mut bad = config();
        bad.calibration_secs = 1e20;
        assert!(matches!(
            Pipeline::new(bad, Constant(ChannelPair::splat(0.0))),
            Err(EcgError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn test_identity_before_calibration() {
        let mut pipeline = Pipeline::new(config(), Constant(ChannelPair::new(3.0, 5.0))).unwrap();
        let record = pipeline.process_tick(Duration::from_millis(10)).unwrap();

        assert!(!pipeline.is_calibrated());
        assert_eq!(record.lead1, 3.0);
        assert_eq!(record.lead2, 5.0);
        assert_eq!(record.lead3, 2.0);
    }

    #[test]
    fn test_polarity_inversion_before_filter() {
        let mut config = config();
        config.invert_polarity.lead2 = true;
        let mut pipeline = Pipeline::new(config, Constant(ChannelPair::new(3.0, 5.0))).unwrap();

        let record = pipeline.process_tick(Duration::ZERO).unwrap();
        assert_eq!(record.lead1, 3.0);
        assert_eq!(record.lead2, -5.0);
    }

    #[test]
    fn test_unit_conversion_applies_to_every_lead() {
        let mut config = config();
        config.unit_conversion = 0.5;
        let mut pipeline = Pipeline::new(config, Constant(ChannelPair::new(2.0, 4.0))).unwrap();

        let record = pipeline.process_tick(Duration::ZERO).unwrap();
        assert_eq!(record.values(), [1.0, 2.0, 1.0, -1.5, 0.0, 1.5]);
    }

    #[test]
    fn test_source_error_leaves_state_untouched() {
        let mut pipeline = Pipeline::new(config(), Failing).unwrap();
        let err = pipeline.process_tick(Duration::from_secs(1)).unwrap_err();

        assert!(matches!(err, EcgError::SourceError { .. }));
        assert_eq!(pipeline.ticks(), 0);
        assert!(!pipeline.is_calibrated());
    }

    #[test]
    fn test_pipelines_do_not_share_state() {
        let mut config = config();
        config.filter_stages = vec![BiquadCoefficients::new(-0.5, 0.0, 0.5, 0.0, 0.0)];

        let mut a = Pipeline::new(config.clone(), Constant(ChannelPair::splat(1.0))).unwrap();
        let mut b = Pipeline::new(config, Constant(ChannelPair::splat(1.0))).unwrap();
        assert_ne!(a.session(), b.session());

        for _ in 0..20 {
            a.process_tick(Duration::ZERO).unwrap();
        }
        let first_b = b.process_tick(Duration::ZERO).unwrap();
        assert_eq!(first_b.lead1, 0.5);
    }

    #[test]
    fn test_builder_name_defaults_to_source() {
        let pipeline = Pipeline::builder(config(), Constant(ChannelPair::splat(0.0)))
            .build()
            .unwrap();
        assert_eq!(pipeline.name(), "constant");

        let named = Pipeline::builder(config(), Constant(ChannelPair::splat(0.0)))
            .name("bench")
            .build()
            .unwrap();
        assert_eq!(named.name(), "bench");
    }
}
