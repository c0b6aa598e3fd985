use crate::domain::jobs::{JobError, JobRecord, Ticket};
use crate::domain::workspace::Workspace;
use crate::ports::queue::{QueueError, WorkQueue};
use crate::ports::repository::{JobMutation, JobStore};
use crate::ports::scheduler::{ScheduledTask, TaskScheduler};
use crate::ports::storage::{StagedUpload, StorageError, WorkspaceStore};
use futures::FutureExt;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Grace period between the end of a download and workspace deletion.
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Missing input_file")]
    MissingInput,
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Job(#[from] JobError),
}

/// Client-facing side of the job lifecycle: accepting work, answering status
/// queries and handing out results.
pub struct JobService {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn WorkQueue>,
    workspaces: Arc<dyn WorkspaceStore>,
    scheduler: Arc<dyn TaskScheduler>,
    cleanup_delay: Duration,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn WorkQueue>,
        workspaces: Arc<dyn WorkspaceStore>,
        scheduler: Arc<dyn TaskScheduler>,
        cleanup_delay: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            workspaces,
            scheduler,
            cleanup_delay,
        }
    }

    /// Scratch space for an incoming upload.
    pub async fn stage_upload(&self) -> Result<StagedUpload, StorageError> {
        self.workspaces.stage().await
    }

    /// Accept a fully received upload: mint a ticket, move the files into the
    /// job's workspace, record the job and queue it.
    ///
    /// An upload without a primary input is discarded before any of that
    /// happens. If the queue refuses the ticket, the record and workspace are
    /// rolled back.
    pub async fn submit(&self, staged: StagedUpload) -> Result<JobRecord, SubmitError> {
        if !staged.has_input() {
            return Err(SubmitError::MissingInput);
        }

        let subtitles = staged.has_subtitles();
        let ticket = Ticket::generate();
        let workspace = self.workspaces.commit(staged, &ticket).await?;

        let record = match self.store.create(ticket.clone(), workspace.clone()).await {
            Ok(record) => record,
            Err(e) => {
                self.discard_workspace(&workspace).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.queue.enqueue(ticket.clone()).await {
            warn!("Rejected job {}: {}", ticket, e);
            self.store.remove(&ticket).await;
            self.discard_workspace(&workspace).await;
            return Err(e.into());
        }

        info!(
            "Queued job {} (subtitles: {}, {} waiting)",
            ticket,
            subtitles,
            self.queue.pending()
        );
        Ok(record)
    }

    /// Current state of a ticket. Collected tickets are reported as unknown.
    pub async fn status(&self, ticket: &Ticket) -> Result<JobRecord, JobError> {
        let record = self.store.get(ticket).await?;
        if record.is_collected() {
            return Err(JobError::NotFound(ticket.clone()));
        }
        Ok(record)
    }

    /// Reserve a finished job's output for download.
    ///
    /// Only one delivery can be in flight per ticket. The returned guard must
    /// be [`Delivery::finish`]ed once the artifact has been sent in full;
    /// dropping it instead makes the output available again.
    pub async fn begin_delivery(self: &Arc<Self>, ticket: &Ticket) -> Result<Delivery, JobError> {
        let record = self
            .store
            .update(
                ticket,
                Box::new(|record: &mut JobRecord| record.begin_delivery().map(|_| ())),
            )
            .await?;

        let output = record
            .output_location()
            .map(Path::to_path_buf)
            .ok_or_else(|| JobError::NotReady {
                ticket: ticket.clone(),
                status: record.status(),
            })?;

        Ok(Delivery {
            service: self.clone(),
            ticket: ticket.clone(),
            workspace: record.workspace().clone(),
            output,
            settled: false,
        })
    }

    fn schedule_cleanup(&self, ticket: Ticket, workspace: Workspace) -> ScheduledTask {
        let store = self.store.clone();
        let workspaces = self.workspaces.clone();
        let task = async move {
            store.remove(&ticket).await;
            match workspaces.remove(&workspace).await {
                Ok(()) => info!("[cleanup] Removed {:?}", workspace.root()),
                Err(e) => warn!("[cleanup] Could not remove {:?}: {}", workspace.root(), e),
            }
        };
        self.scheduler.schedule(self.cleanup_delay, task.boxed())
    }

    fn release_delivery(&self, ticket: Ticket) {
        let store = self.store.clone();
        let task = async move {
            let abandon: JobMutation = Box::new(|record: &mut JobRecord| {
                record.abandon_delivery();
                Ok(())
            });
            if store.update(&ticket, abandon).await.is_ok() {
                debug!("Delivery of {} abandoned, output kept", ticket);
            }
        };
        self.scheduler.schedule(Duration::ZERO, task.boxed());
    }

    async fn discard_workspace(&self, workspace: &Workspace) {
        if let Err(e) = self.workspaces.remove(workspace).await {
            warn!("Could not remove workspace {:?}: {}", workspace.root(), e);
        }
    }
}

/// A download in progress. See [`JobService::begin_delivery`].
pub struct Delivery {
    service: Arc<JobService>,
    ticket: Ticket,
    workspace: Workspace,
    output: PathBuf,
    settled: bool,
}

impl Delivery {
    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// The artifact went out in full: spend the ticket and schedule removal
    /// of the record and workspace after the grace delay.
    pub async fn finish(mut self) -> Result<ScheduledTask, JobError> {
        self.settled = true;
        let collect: JobMutation = Box::new(|record: &mut JobRecord| {
            record.finish_delivery();
            Ok(())
        });
        self.service.store.update(&self.ticket, collect).await?;
        info!("Delivered result for {}", self.ticket);
        Ok(self
            .service
            .schedule_cleanup(self.ticket.clone(), self.workspace.clone()))
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if !self.settled {
            self.service.release_delivery(self.ticket.clone());
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("ticket", &self.ticket)
            .field("output", &self.output)
            .field("settled", &self.settled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::fs::FsWorkspaces;
    use crate::adapters::local::memory::InMemoryJobStore;
    use crate::adapters::local::queue::ChannelQueue;
    use crate::adapters::local::scheduler::TokioScheduler;
    use crate::domain::jobs::{JobStatus, WorkerId};
    use tempfile::{tempdir, TempDir};

    struct Harness {
        _root: TempDir,
        store: Arc<InMemoryJobStore>,
        queue: Arc<ChannelQueue>,
        workspaces: Arc<FsWorkspaces>,
        service: Arc<JobService>,
    }

    async fn harness(capacity: Option<usize>) -> Harness {
        let root = tempdir().unwrap();
        let store = Arc::new(InMemoryJobStore::new());
        let queue = Arc::new(ChannelQueue::new(capacity));
        let workspaces = Arc::new(FsWorkspaces::open(root.path()).await.unwrap());
        let service = Arc::new(JobService::new(
            store.clone(),
            queue.clone(),
            workspaces.clone(),
            Arc::new(TokioScheduler),
            DEFAULT_CLEANUP_DELAY,
        ));
        Harness {
            _root: root,
            store,
            queue,
            workspaces,
            service,
        }
    }

    async fn upload(service: &JobService, with_input: bool) -> StagedUpload {
        let mut staged = service.stage_upload().await.unwrap();
        if with_input {
            tokio::fs::write(staged.layout().input_path(), b"media")
                .await
                .unwrap();
            staged.mark_input();
        }
        staged
    }

    fn entries(path: &Path) -> usize {
        std::fs::read_dir(path).unwrap().count()
    }

    async fn finish_job(h: &Harness, ticket: &Ticket) -> PathBuf {
        let record = h.store.get(ticket).await.unwrap();
        let output = record.workspace().output_path();
        tokio::fs::write(&output, b"encoded").await.unwrap();
        let done = output.clone();
        h.store
            .update(
                ticket,
                Box::new(move |record: &mut JobRecord| {
                    record.claim(WorkerId::new(0))?;
                    record.complete(done)
                }),
            )
            .await
            .unwrap();
        output
    }

    #[tokio::test]
    async fn submission_without_input_leaves_nothing_behind() {
        let h = harness(None).await;
        let staged = upload(&h.service, false).await;

        let err = h.service.submit(staged).await.unwrap_err();
        assert!(matches!(err, SubmitError::MissingInput));
        assert!(h.store.is_empty());
        assert_eq!(h.queue.pending(), 0);
        assert_eq!(entries(h.workspaces.root()), 0);
    }

    #[tokio::test]
    async fn submission_creates_queued_record_and_workspace() {
        let h = harness(None).await;
        let record = h.service.submit(upload(&h.service, true).await).await.unwrap();

        assert_eq!(record.status(), JobStatus::Queued);
        assert_eq!(h.queue.pending(), 1);
        assert!(record.workspace().input_path().is_file());
        assert_eq!(
            record.workspace().root(),
            h.workspaces.root().join(record.ticket().as_str())
        );

        let claim = h.queue.dequeue(&WorkerId::new(0)).await.unwrap();
        assert_eq!(&claim.ticket, record.ticket());
    }

    #[tokio::test]
    async fn full_queue_rolls_back_the_submission() {
        let h = harness(Some(1)).await;
        h.service.submit(upload(&h.service, true).await).await.unwrap();

        let err = h
            .service
            .submit(upload(&h.service, true).await)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Queue(QueueError::Full { capacity: 1 })
        ));
        assert_eq!(h.store.len(), 1);
        assert_eq!(entries(h.workspaces.root()), 1);
    }

    #[tokio::test]
    async fn unknown_ticket_is_not_found() {
        let h = harness(None).await;
        let ticket = Ticket::from("missing");
        assert!(matches!(
            h.service.status(&ticket).await,
            Err(JobError::NotFound(_))
        ));
        assert!(matches!(
            h.service.begin_delivery(&ticket).await,
            Err(JobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unfinished_job_is_not_ready() {
        let h = harness(None).await;
        let record = h.service.submit(upload(&h.service, true).await).await.unwrap();
        let ticket = record.ticket().clone();

        assert!(matches!(
            h.service.begin_delivery(&ticket).await,
            Err(JobError::NotReady {
                status: JobStatus::Queued,
                ..
            })
        ));

        h.store
            .update(
                &ticket,
                Box::new(|record: &mut JobRecord| {
                    record.claim(WorkerId::new(0))?;
                    record.fail("encoder exploded")
                }),
            )
            .await
            .unwrap();
        assert!(matches!(
            h.service.begin_delivery(&ticket).await,
            Err(JobError::NotReady {
                status: JobStatus::Failed,
                ..
            })
        ));
        assert_eq!(
            h.service.status(&ticket).await.unwrap().error_detail(),
            Some("encoder exploded")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn delivered_ticket_is_spent_and_cleaned_up_after_delay() {
        let h = harness(None).await;
        let record = h.service.submit(upload(&h.service, true).await).await.unwrap();
        let ticket = record.ticket().clone();
        let output = finish_job(&h, &ticket).await;

        let delivery = h.service.begin_delivery(&ticket).await.unwrap();
        assert_eq!(delivery.output(), output.as_path());
        assert!(matches!(
            h.service.begin_delivery(&ticket).await,
            Err(JobError::NotFound(_))
        ));

        let cleanup = delivery.finish().await.unwrap();
        assert!(matches!(
            h.service.status(&ticket).await,
            Err(JobError::NotFound(_))
        ));
        assert!(matches!(
            h.service.begin_delivery(&ticket).await,
            Err(JobError::NotFound(_))
        ));
        // still on disk during the grace period
        assert!(record.workspace().root().exists());
        assert!(!cleanup.is_finished());

        tokio::time::advance(DEFAULT_CLEANUP_DELAY).await;
        assert!(cleanup.finished().await);
        assert!(!record.workspace().root().exists());
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn abandoned_delivery_can_be_retried() {
        let h = harness(None).await;
        let record = h.service.submit(upload(&h.service, true).await).await.unwrap();
        let ticket = record.ticket().clone();
        finish_job(&h, &ticket).await;

        drop(h.service.begin_delivery(&ticket).await.unwrap());

        let mut retried = None;
        for _ in 0..100 {
            if let Ok(delivery) = h.service.begin_delivery(&ticket).await {
                retried = Some(delivery);
                break;
            }
            tokio::task::yield_now().await;
        }
        let delivery = retried.expect("output should become available again");
        assert_eq!(delivery.ticket(), &ticket);
        assert_eq!(
            h.service.status(&ticket).await.unwrap().status(),
            JobStatus::Done
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_tolerates_a_missing_workspace() {
        let h = harness(None).await;
        let record = h.service.submit(upload(&h.service, true).await).await.unwrap();
        let ticket = record.ticket().clone();
        finish_job(&h, &ticket).await;

        let delivery = h.service.begin_delivery(&ticket).await.unwrap();
        std::fs::remove_dir_all(record.workspace().root()).unwrap();

        let cleanup = delivery.finish().await.unwrap();
        tokio::time::advance(DEFAULT_CLEANUP_DELAY).await;
        assert!(cleanup.finished().await);
        assert!(h.store.is_empty());
    }
}
