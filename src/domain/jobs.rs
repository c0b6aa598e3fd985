use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use super::workspace::Workspace;

/// Opaque handle returned to the client at submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticket(String);

impl Ticket {
    /// Mint a fresh ticket. Tickets are random v4 UUIDs and never reused.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Ticket {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Ticket {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a pool worker, handed out with every claimed ticket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Worker names are 1-based: index 0 is `worker-1`.
    pub fn new(index: usize) -> Self {
        Self(format!("worker-{}", index + 1))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Externally visible job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    /// `done` and `failed` admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status together with the data that only exists in that status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Processing,
    Done { output: PathBuf },
    Failed { detail: String },
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Queued => JobStatus::Queued,
            JobState::Processing => JobStatus::Processing,
            JobState::Done { .. } => JobStatus::Done,
            JobState::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// Where a finished job stands with respect to handing its output over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPhase {
    Available,
    InFlight,
    Collected,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("ticket {0} not found")]
    NotFound(Ticket),
    #[error("ticket {ticket} is not ready (status: {status})")]
    NotReady { ticket: Ticket, status: JobStatus },
    #[error("ticket {0} already exists")]
    AlreadyExists(Ticket),
    #[error("ticket {ticket}: cannot move from {from} to {to}")]
    InvalidTransition {
        ticket: Ticket,
        from: JobStatus,
        to: JobStatus,
    },
}

/// One submitted job. All state changes go through the transition methods,
/// which refuse anything outside `queued -> processing -> {done, failed}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    ticket: Ticket,
    workspace: Workspace,
    state: JobState,
    assigned_worker: Option<WorkerId>,
    delivery: DeliveryPhase,
}

impl JobRecord {
    pub fn new(ticket: Ticket, workspace: Workspace) -> Self {
        Self {
            ticket,
            workspace,
            state: JobState::Queued,
            assigned_worker: None,
            delivery: DeliveryPhase::Available,
        }
    }

    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn assigned_worker(&self) -> Option<&WorkerId> {
        self.assigned_worker.as_ref()
    }

    pub fn output_location(&self) -> Option<&Path> {
        match &self.state {
            JobState::Done { output } => Some(output),
            _ => None,
        }
    }

    pub fn error_detail(&self) -> Option<&str> {
        match &self.state {
            JobState::Failed { detail } => Some(detail),
            _ => None,
        }
    }

    pub fn delivery(&self) -> DeliveryPhase {
        self.delivery
    }

    /// True once the output has been streamed to a client in full.
    pub fn is_collected(&self) -> bool {
        self.delivery == DeliveryPhase::Collected
    }

    /// queued -> processing, stamping the claiming worker.
    pub fn claim(&mut self, worker: WorkerId) -> Result<(), JobError> {
        self.ensure_status(JobStatus::Queued, JobStatus::Processing)?;
        self.state = JobState::Processing;
        self.assigned_worker = Some(worker);
        Ok(())
    }

    /// processing -> done.
    pub fn complete(&mut self, output: PathBuf) -> Result<(), JobError> {
        self.ensure_status(JobStatus::Processing, JobStatus::Done)?;
        self.state = JobState::Done { output };
        Ok(())
    }

    /// processing -> failed.
    pub fn fail(&mut self, detail: impl Into<String>) -> Result<(), JobError> {
        self.ensure_status(JobStatus::Processing, JobStatus::Failed)?;
        self.state = JobState::Failed {
            detail: detail.into(),
        };
        Ok(())
    }

    /// Reserve the output for a single download. Returns the artifact path.
    pub fn begin_delivery(&mut self) -> Result<PathBuf, JobError> {
        let output = match &self.state {
            JobState::Done { output } => output.clone(),
            other => {
                return Err(JobError::NotReady {
                    ticket: self.ticket.clone(),
                    status: other.status(),
                })
            }
        };
        match self.delivery {
            DeliveryPhase::Available => {
                self.delivery = DeliveryPhase::InFlight;
                Ok(output)
            }
            // Someone else holds or already took the artifact.
            DeliveryPhase::InFlight | DeliveryPhase::Collected => {
                Err(JobError::NotFound(self.ticket.clone()))
            }
        }
    }

    /// The stream reached its end: the ticket is spent.
    pub fn finish_delivery(&mut self) {
        self.delivery = DeliveryPhase::Collected;
    }

    /// The stream was abandoned part way; the artifact can be fetched again.
    pub fn abandon_delivery(&mut self) {
        if self.delivery == DeliveryPhase::InFlight {
            self.delivery = DeliveryPhase::Available;
        }
    }

    fn ensure_status(&self, from: JobStatus, to: JobStatus) -> Result<(), JobError> {
        if self.status() == from {
            Ok(())
        } else {
            Err(JobError::InvalidTransition {
                ticket: self.ticket.clone(),
                from: self.status(),
                to,
            })
        }
    }
}
