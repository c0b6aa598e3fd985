use crate::domain::av::command::{TranscodeCommand, TranscodeSettings};
use crate::domain::jobs::{JobError, JobRecord, WorkerId};
use crate::domain::options::EncodeOptions;
use crate::ports::queue::{Claim, QueueError, WorkQueue};
use crate::ports::repository::{JobMutation, JobStore};
use crate::ports::transcoder::TranscodeExecutor;
use futures::FutureExt;
use std::any::Any;
use std::io;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Why a job ended up `failed`.
#[derive(Debug, Error)]
pub enum TranscodeFailure {
    #[error("could not read options: {0}")]
    OptionsUnreadable(#[source] io::Error),
    #[error("malformed options: {0}")]
    OptionsMalformed(#[source] serde_json::Error),
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {}", describe_exit(.code))]
    Exited {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("job processing panicked: {0}")]
    Panicked(String),
}

impl TranscodeFailure {
    /// Text stored as the job's error detail: the transcoder's own
    /// diagnostics when it printed any.
    pub fn detail(&self) -> String {
        match self {
            TranscodeFailure::Exited { stderr, .. } if !stderr.trim().is_empty() => stderr.clone(),
            other => other.to_string(),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => String::from("no exit code (terminated by a signal)"),
    }
}

/// Pulls tickets off the queue and runs them through the transcoder.
pub struct WorkerService {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn WorkQueue>,
    executor: Arc<dyn TranscodeExecutor>,
    settings: TranscodeSettings,
}

impl WorkerService {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn WorkQueue>,
        executor: Arc<dyn TranscodeExecutor>,
        settings: TranscodeSettings,
    ) -> Self {
        Self {
            store,
            queue,
            executor,
            settings,
        }
    }

    /// Serve tickets until the queue is closed. A failing job never ends
    /// the loop.
    pub async fn run_worker_loop(&self, worker: WorkerId) {
        info!("[{}] Started", worker);
        loop {
            match self.queue.dequeue(&worker).await {
                Ok(claim) => {
                    self.process_claim(claim).await;
                }
                Err(QueueError::Closed) => break,
                Err(e) => {
                    warn!("[{}] Queue error: {}", worker, e);
                    tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                }
            }
        }
        info!("[{}] Queue closed, stopping", worker);
    }

    /// Run one claimed ticket to a terminal status.
    ///
    /// Returns the final record, or `None` when the ticket no longer exists
    /// or was already taken.
    pub async fn process_claim(&self, claim: Claim) -> Option<JobRecord> {
        let Claim { ticket, worker } = claim;

        let claimed_by = worker.clone();
        let take: JobMutation = Box::new(move |record: &mut JobRecord| record.claim(claimed_by));
        let record = match self.store.update(&ticket, take).await {
            Ok(record) => record,
            Err(JobError::NotFound(_)) => {
                debug!("[{}] Ticket {} is gone, skipping", worker, ticket);
                return None;
            }
            Err(e) => {
                warn!("[{}] Cannot claim {}: {}", worker, ticket, e);
                return None;
            }
        };

        info!("[{}] Working on {}", worker, ticket);

        let outcome = match AssertUnwindSafe(self.transcode(&record))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => Err(TranscodeFailure::Panicked(panic_message(panic.as_ref()))),
        };

        let settle: JobMutation = match outcome {
            Ok(output) => {
                info!("[{}] Finished {}", worker, ticket);
                Box::new(move |record: &mut JobRecord| record.complete(output))
            }
            Err(failure) => {
                warn!("[{}] Job {} failed: {}", worker, ticket, failure);
                let detail = failure.detail();
                Box::new(move |record: &mut JobRecord| record.fail(detail))
            }
        };

        match self.store.update(&ticket, settle).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("[{}] Could not record outcome of {}: {}", worker, ticket, e);
                None
            }
        }
    }

    async fn transcode(&self, record: &JobRecord) -> Result<PathBuf, TranscodeFailure> {
        let workspace = record.workspace();
        let options = load_options(&workspace.options_path()).await?;

        let subtitle_path = workspace.subtitle_path();
        let has_subtitles = tokio::fs::try_exists(&subtitle_path)
            .await
            .unwrap_or(false);
        let subtitles = has_subtitles.then_some(subtitle_path.as_path());

        let command = TranscodeCommand::build(&self.settings, workspace, &options, subtitles);
        debug!("Running {} {:?}", command.program, command.args);

        let output = self
            .executor
            .run(&command)
            .await
            .map_err(|source| TranscodeFailure::Spawn {
                program: command.program.clone(),
                source,
            })?;

        if output.success() {
            Ok(workspace.output_path())
        } else {
            Err(TranscodeFailure::Exited {
                program: command.program,
                code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }
}

/// A missing options file means all defaults; an unparsable one fails the job.
async fn load_options(path: &Path) -> Result<EncodeOptions, TranscodeFailure> {
    match tokio::fs::read(path).await {
        Ok(bytes) => EncodeOptions::from_document(&bytes).map_err(TranscodeFailure::OptionsMalformed),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(EncodeOptions::default()),
        Err(e) => Err(TranscodeFailure::OptionsUnreadable(e)),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic payload")
    }
}

/// Fixed-size pool of workers sharing one queue.
pub struct WorkerPool {
    service: Arc<WorkerService>,
}

impl WorkerPool {
    pub fn new(service: Arc<WorkerService>) -> Self {
        Self { service }
    }

    /// Spawn `size` workers named `worker-1` .. `worker-<size>`.
    pub fn start(&self, size: usize) -> Vec<JoinHandle<()>> {
        (0..size)
            .map(|index| {
                let service = self.service.clone();
                tokio::spawn(async move {
                    service.run_worker_loop(WorkerId::new(index)).await;
                })
            })
            .collect()
    }
}
