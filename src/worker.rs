//! Single-threaded trim worker.
//!
//! Jobs are queued on a bounded channel and run one at a time on a dedicated
//! OS thread, since a trim is blocking file I/O from start to finish. Each
//! caller gets exactly one reply through its own oneshot channel.

use crate::error::{TrimError, TrimErrorKind};
use crate::output::OutputNamer;
use crate::request::{TrimJob, TrimRequest};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};
use vidtrim_media::{RemuxEngine, RemuxSummary};

/// The success half of a trim response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimOutcome {
    /// Absolute path of the new file.
    pub output: PathBuf,
    pub summary: RemuxSummary,
}

pub type TrimResult = Result<TrimOutcome, TrimError>;

struct Envelope {
    job: TrimJob,
    reply: oneshot::Sender<TrimResult>,
}

/// Handle to the worker thread.
///
/// Dropping every handle closes the queue; the thread finishes the jobs
/// already queued and exits.
#[derive(Clone)]
pub struct TrimWorker {
    tx: mpsc::Sender<Envelope>,
}

impl TrimWorker {
    /// Start the worker thread.
    pub fn spawn(
        engine: RemuxEngine,
        namer: OutputNamer,
        queue_depth: usize,
    ) -> std::io::Result<(Self, thread::JoinHandle<()>)> {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let handle = thread::Builder::new()
            .name("vidtrim-worker".to_string())
            .spawn(move || run(rx, engine, namer))?;
        Ok((Self { tx }, handle))
    }

    /// Validate `request` and run it.
    pub async fn trim(&self, request: TrimRequest) -> TrimResult {
        let job = request.validate()?;
        self.submit(job).await
    }

    /// Queue a validated job and wait for its result.
    ///
    /// Waits for queue space when the worker is busy.
    pub async fn submit(&self, job: TrimJob) -> TrimResult {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { job, reply })
            .await
            .map_err(|_| worker_gone())?;
        rx.await.map_err(|_| worker_gone())?
    }
}

fn worker_gone() -> TrimError {
    TrimError::new(TrimErrorKind::IoError, "trim worker is not running")
}

fn run(mut rx: mpsc::Receiver<Envelope>, engine: RemuxEngine, namer: OutputNamer) {
    info!("Trim worker started");

    while let Some(Envelope { job, reply }) = rx.blocking_recv() {
        let result = process(&engine, &namer, job);

        if let Err(ref e) = result {
            error!("Trim failed: {}", e);
        }
        if reply.send(result).is_err() {
            debug!("Trim requester went away before the result was ready");
        }
    }

    info!("Trim worker stopped");
}

fn process(engine: &RemuxEngine, namer: &OutputNamer, job: TrimJob) -> TrimResult {
    let output = match job.output {
        Some(path) => path,
        None => namer.next_path()?,
    };

    let summary = engine.trim_file(&job.source, &output, job.window, job.rotation)?;
    Ok(TrimOutcome { output, summary })
}
