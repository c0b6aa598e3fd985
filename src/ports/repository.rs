use crate::domain::jobs::{JobError, JobRecord, Ticket};
use crate::domain::workspace::Workspace;
use async_trait::async_trait;

/// A change applied to a record under the store's lock. If it returns an
/// error the stored record is left untouched.
pub type JobMutation = Box<dyn FnOnce(&mut JobRecord) -> Result<(), JobError> + Send>;

/// Single source of truth for job state.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Register a freshly submitted job in `queued` state
    async fn create(&self, ticket: Ticket, workspace: Workspace) -> Result<JobRecord, JobError>;

    /// Snapshot of a record, `JobError::NotFound` for unknown tickets
    async fn get(&self, ticket: &Ticket) -> Result<JobRecord, JobError>;

    /// Apply `mutation` atomically and return the updated record
    async fn update(&self, ticket: &Ticket, mutation: JobMutation) -> Result<JobRecord, JobError>;

    /// Drop a record. Removing an unknown ticket is not an error.
    async fn remove(&self, ticket: &Ticket) -> Option<JobRecord>;
}
