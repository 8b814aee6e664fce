//! Bridges the blocking sample scheduler to async consumers
//!
//! The scheduler runs on a blocking thread and pushes each record into a
//! bounded channel. A full channel blocks the scheduler; a dropped receiver
//! ends the run with [`StopReason::EmitterClosed`](ecg_processing::StopReason).

use anyhow::Context;
use ecg_core::{ChannelSource, EcgError, EcgResult, LeadRecord};
use ecg_processing::{Clock, Pipeline, RecordEmitter, RunSummary, SampleScheduler, StopHandle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Record tagged with its tick index
pub type TickRecord = (u64, LeadRecord);

/// Emitter feeding a tokio channel from a blocking thread
pub struct ChannelEmitter {
    sender: mpsc::Sender<TickRecord>,
}

impl ChannelEmitter {
    pub fn new(sender: mpsc::Sender<TickRecord>) -> Self {
        Self { sender }
    }
}

impl RecordEmitter for ChannelEmitter {
    fn emit(&mut self, tick: u64, record: &LeadRecord) -> EcgResult<()> {
        self.sender
            .blocking_send((tick, *record))
            .map_err(|_| EcgError::EmitterClosed)
    }
}

/// Handle to a running pipeline
pub struct EcgStream {
    records: mpsc::Receiver<TickRecord>,
    stop: StopHandle,
    task: JoinHandle<EcgResult<RunSummary>>,
}

impl EcgStream {
    /// Next record, or `None` once the run has ended
    pub async fn next(&mut self) -> Option<TickRecord> {
        self.records.recv().await
    }

    /// Ask the scheduler to stop before its next tick
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Close the stream and wait for the scheduler to finish
    pub async fn finish(self) -> anyhow::Result<RunSummary> {
        let Self { records, stop, task } = self;
        stop.stop();
        drop(records);

        let summary = task.await.context("pipeline task panicked")??;
        debug!(?summary, "Stream finished");
        Ok(summary)
    }
}

/// Start `pipeline` under `scheduler` on the blocking pool
pub fn start_ecg_stream<S, C>(
    pipeline: Pipeline<S>,
    scheduler: SampleScheduler<C>,
    buffer: usize,
) -> EcgStream
where
    S: ChannelSource + Send + 'static,
    C: Clock + Send + 'static,
{
    let (sender, records) = mpsc::channel(buffer.max(1));
    let stop = scheduler.stop_handle();

    let task = tokio::task::spawn_blocking(move || {
        let mut pipeline = pipeline;
        let mut emitter = ChannelEmitter::new(sender);
        scheduler.run(&mut pipeline, &mut emitter)
    });

    EcgStream { records, stop, task }
}
