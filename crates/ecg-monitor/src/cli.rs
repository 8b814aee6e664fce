use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ecg_processing::config::REFERENCE_STAGES;
use ecg_processing::{PipelineConfig, RunLimit};
use ecg_simulation::{PulseConfig, SourceConfig, SyntheticConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "ecg-monitor",
    version,
    about = "Two-channel ECG acquisition pipeline",
    long_about = "Filters, calibrates and expands two raw ECG channels into six leads,\n\
                  writing one record per sample tick to stdout. Logs go to stderr."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the pipeline and stream records to stdout
    Run(RunArgs),
    /// Print the effective pipeline configuration as JSON
    Config(PipelineArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Beat-shaped synthetic ECG
    Synthetic,
    /// Square calibration mark
    Pulse,
    /// Two values per line from --input or stdin
    Live,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Tsv,
    Json,
}

#[derive(Args, Clone, Debug)]
pub struct PipelineArgs {
    /// Pipeline configuration file (JSON)
    #[arg(long, env = "ECG_PIPELINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Sample rate in Hz; filters are designed from the reference stages
    #[arg(long, conflicts_with = "config")]
    pub sample_rate: Option<f32>,

    /// Calibration window in seconds
    #[arg(long)]
    pub calibration_secs: Option<f32>,

    /// Invert Lead I polarity
    #[arg(long)]
    pub invert_lead1: bool,

    /// Invert Lead II polarity
    #[arg(long)]
    pub invert_lead2: bool,

    /// Factor applied to every lead before output
    #[arg(long)]
    pub unit_conversion: Option<f32>,
}

impl PipelineArgs {
    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match (&self.config, self.sample_rate) {
            (Some(path), _) => PipelineConfig::load(path)
                .with_context(|| format!("loading pipeline config {}", path.display()))?,
            (None, Some(rate)) => PipelineConfig::designed(rate, &REFERENCE_STAGES)
                .with_context(|| format!("designing filters for {} Hz", rate))?,
            (None, None) => PipelineConfig::reference_design(),
        };

        if let Some(secs) = self.calibration_secs {
            config.calibration_secs = secs;
        }
        if let Some(factor) = self.unit_conversion {
            config.unit_conversion = factor;
        }
        config.invert_polarity.lead1 |= self.invert_lead1;
        config.invert_polarity.lead2 |= self.invert_lead2;

        config.validate().context("invalid pipeline configuration")?;
        Ok(config)
    }
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Signal source
    #[arg(long, value_enum, default_value_t = SourceKind::Synthetic)]
    pub source: SourceKind,

    /// Input file for the live source (stdin when omitted)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Synthetic heart rate in beats per minute
    #[arg(long, default_value_t = 72.0)]
    pub heart_rate: f32,

    /// Seed for synthetic noise
    #[arg(long)]
    pub seed: Option<u64>,

    /// Record format on stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Omit the header line of delimited output
    #[arg(long)]
    pub no_header: bool,

    /// Stop after this many ticks
    #[arg(long, conflicts_with = "duration")]
    pub ticks: Option<u64>,

    /// Stop after this many seconds
    #[arg(long)]
    pub duration: Option<f64>,

    /// Run on a simulated clock, as fast as the pipeline allows
    #[arg(long)]
    pub fast: bool,

    /// Records buffered between the pipeline and the writer
    #[arg(long, default_value_t = 256)]
    pub buffer: usize,

    /// Print run statistics as JSON on stderr when done
    #[arg(long)]
    pub stats: bool,
}

impl RunArgs {
    pub fn source_config(&self) -> anyhow::Result<SourceConfig> {
        if self.input.is_some() && self.source != SourceKind::Live {
            bail!("--input only applies to --source live");
        }
        Ok(match self.source {
            SourceKind::Synthetic => SourceConfig::Synthetic(SyntheticConfig {
                heart_rate_bpm: self.heart_rate,
                seed: self.seed,
                ..SyntheticConfig::default()
            }),
            SourceKind::Pulse => SourceConfig::CalibrationPulse(PulseConfig::default()),
            SourceKind::Live => SourceConfig::Live {
                path: self.input.clone(),
            },
        })
    }

    pub fn run_limit(&self) -> anyhow::Result<RunLimit> {
        Ok(match (self.ticks, self.duration) {
            (Some(ticks), _) => RunLimit::Ticks(ticks),
            (None, Some(secs)) => RunLimit::Duration(
                Duration::try_from_secs_f64(secs)
                    .with_context(|| format!("invalid duration {}", secs))?,
            ),
            (None, None) => RunLimit::Forever,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn run_args(args: &[&str]) -> RunArgs {
        let argv = ["ecg-monitor", "run"].iter().chain(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Run(args) => args,
            Command::Config(_) => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = run_args(&[]);
        assert_eq!(args.source, SourceKind::Synthetic);
        assert_eq!(args.format, OutputFormat::Csv);
        assert_eq!(args.run_limit().unwrap(), RunLimit::Forever);

        let config = args.pipeline.pipeline_config().unwrap();
        assert_eq!(config.sample_rate_hz, 125.0);
    }

    #[test]
    fn test_overrides() {
        let args = run_args(&[
            "--sample-rate", "250", "--calibration-secs", "2", "--invert-lead2", "--ticks", "10",
        ]);
        let config = args.pipeline.pipeline_config().unwrap();
        assert_eq!(config.sample_rate_hz, 250.0);
        assert_eq!(config.calibration_secs, 2.0);
        assert!(config.invert_polarity.lead2);
        assert!(!config.invert_polarity.lead1);
        assert_eq!(args.run_limit().unwrap(), RunLimit::Ticks(10));
    }

    #[test]
    fn test_ticks_and_duration_conflict() {
        let argv = ["ecg-monitor", "run", "--ticks", "5", "--duration", "1"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = run_args(&["--unit-conversion", "0"]);
        assert!(args.pipeline.pipeline_config().is_err());
    }

    #[test]
    fn test_input_requires_live_source() {
        let args = run_args(&["--input", "ecg.csv"]);
        assert!(args.source_config().is_err());

        let args = run_args(&["--source", "live", "--input", "ecg.csv"]);
        assert!(matches!(args.source_config().unwrap(), SourceConfig::Live { path: Some(_) }));
    }
}
