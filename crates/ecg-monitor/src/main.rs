//! ECG Monitor - acquisition pipeline streaming six-lead records to stdout

mod cli;
mod stream_service;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command, OutputFormat, PipelineArgs, RunArgs};
use ecg_core::{EcgError, LeadRecord};
use ecg_processing::{
    DelimitedEmitter, JsonLinesEmitter, MonotonicClock, Pipeline, RecordEmitter, SampleScheduler,
    SimulatedClock,
};
use ecg_simulation::SignalSource;
use std::future::Future;
use stream_service::{start_ecg_stream, EcgStream};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Config(args) => show_config(&args),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn show_config(args: &PipelineArgs) -> anyhow::Result<()> {
    let config = args.pipeline_config()?;
    println!("{}", config.to_json()?);
    Ok(())
}

/// Encodes records into an in-memory line buffer for the async writer
enum LineEncoder {
    Delimited(DelimitedEmitter<Vec<u8>>),
    Json(JsonLinesEmitter<Vec<u8>>),
}

impl LineEncoder {
    fn new(format: OutputFormat, header: bool) -> Self {
        match format {
            OutputFormat::Csv => LineEncoder::Delimited(DelimitedEmitter::new(Vec::new(), ',', header)),
            OutputFormat::Tsv => LineEncoder::Delimited(DelimitedEmitter::new(Vec::new(), '\t', header)),
            OutputFormat::Json => LineEncoder::Json(JsonLinesEmitter::new(Vec::new())),
        }
    }

    fn encode(&mut self, tick: u64, record: &LeadRecord) -> Result<&mut Vec<u8>, EcgError> {
        match self {
            LineEncoder::Delimited(emitter) => {
                emitter.emit(tick, record)?;
                Ok(emitter.get_mut())
            }
            LineEncoder::Json(emitter) => {
                emitter.emit(tick, record)?;
                Ok(emitter.get_mut())
            }
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = args.pipeline.pipeline_config()?;
    let source = SignalSource::from_config(&args.source_config()?, config.sample_rate_hz)
        .context("starting signal source")?;
    let limit = args.run_limit()?;
    let pipeline = Pipeline::new(config, source)?;

    info!(session = %pipeline.session(), fast = args.fast, "Starting ECG stream");

    let stream = if args.fast {
        start_ecg_stream(pipeline, SampleScheduler::new(SimulatedClock::new()).with_limit(limit), args.buffer)
    } else {
        start_ecg_stream(pipeline, SampleScheduler::new(MonotonicClock::new()).with_limit(limit), args.buffer)
    };

    let mut encoder = LineEncoder::new(args.format, !args.no_header);
    let stream = pump(stream, &mut encoder, tokio::io::stdout(), tokio::signal::ctrl_c()).await?;

    let summary = stream.finish().await?;
    info!(
        reason = ?summary.reason,
        ticks = summary.stats.ticks,
        overruns = summary.stats.overruns,
        rate_hz = summary.stats.effective_rate_hz(),
        "ECG stream finished"
    );
    if args.stats {
        eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

/// Write records to `out` until the stream ends, `out` closes or `shutdown` completes
///
/// `shutdown` is polled across iterations, so it also fires while a write is pending.
async fn pump<W, F>(
    mut stream: EcgStream,
    encoder: &mut LineEncoder,
    out: W,
    shutdown: F,
) -> anyhow::Result<EcgStream>
where
    W: AsyncWrite + Unpin,
    F: Future,
{
    let mut out = BufWriter::new(out);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            next = stream.next() => {
                let Some((tick, record)) = next else { break };
                let buffer = encoder.encode(tick, &record)?;
                let written = out.write_all(buffer).await;
                buffer.clear();
                if let Err(e) = written {
                    if e.kind() == std::io::ErrorKind::BrokenPipe {
                        info!("stdout closed");
                        break;
                    }
                    return Err(e).context("writing records");
                }
            }
            _ = &mut shutdown => {
                warn!("Interrupted, stopping stream");
                stream.stop();
                break;
            }
        }
    }

    match out.flush().await {
        Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
            return Err(e).context("flushing records")
        }
        _ => {}
    }
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecg_processing::{PipelineConfig, RunLimit, StopReason};
    use ecg_simulation::{PulseConfig, SourceConfig};
    use std::io;
    use std::pin::Pin;
    use std::task::{self, Poll};
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Collects output and fires `trip` on its first write
    struct TripWriter {
        written: Vec<u8>,
        trip: Option<oneshot::Sender<()>>,
    }

    impl AsyncWrite for TripWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut task::Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if let Some(trip) = self.trip.take() {
                let _ = trip.send(());
            }
            self.written.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut task::Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut task::Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn endless_stream() -> EcgStream {
        let source =
            SignalSource::from_config(&SourceConfig::CalibrationPulse(PulseConfig::default()), 125.0)
                .unwrap();
        let pipeline = Pipeline::new(PipelineConfig::passthrough(125.0), source).unwrap();
        let scheduler = SampleScheduler::new(SimulatedClock::new()).with_limit(RunLimit::Forever);
        start_ecg_stream(pipeline, scheduler, 16)
    }

    #[tokio::test]
    async fn test_shutdown_raised_during_write_stops_pump() {
        let (trip, tripped) = oneshot::channel();
        let mut writer = TripWriter {
            written: Vec::new(),
            trip: Some(trip),
        };
        let mut encoder = LineEncoder::new(OutputFormat::Csv, true);

        let stream = tokio::time::timeout(
            Duration::from_secs(10),
            pump(endless_stream(), &mut encoder, &mut writer, tripped),
        )
        .await
        .expect("pump ignored shutdown")
        .unwrap();

        let summary = stream.finish().await.unwrap();
        assert!(matches!(
            summary.reason,
            StopReason::Stopped | StopReason::EmitterClosed
        ));

        let text = String::from_utf8(writer.written).unwrap();
        assert!(text.starts_with("tick,lead1,"));
    }

    #[tokio::test]
    async fn test_pump_writes_every_record_of_a_finite_run() {
        let source =
            SignalSource::from_config(&SourceConfig::CalibrationPulse(PulseConfig::default()), 125.0)
                .unwrap();
        let pipeline = Pipeline::new(PipelineConfig::passthrough(125.0), source).unwrap();
        let scheduler = SampleScheduler::new(SimulatedClock::new()).with_limit(RunLimit::Ticks(25));
        let stream = start_ecg_stream(pipeline, scheduler, 4);

        let mut out = Vec::new();
        let mut encoder = LineEncoder::new(OutputFormat::Json, false);
        let stream = pump(stream, &mut encoder, &mut out, std::future::pending::<()>())
            .await
            .unwrap();

        assert_eq!(stream.finish().await.unwrap().reason, StopReason::LimitReached);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 25);
    }
}
