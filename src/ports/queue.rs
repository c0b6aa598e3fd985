use crate::domain::jobs::{Ticket, WorkerId};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("work queue is full ({capacity} jobs waiting)")]
    Full { capacity: usize },
    #[error("work queue is closed")]
    Closed,
}

/// A ticket handed to exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub ticket: Ticket,
    pub worker: WorkerId,
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Append a ticket; never waits for a worker
    async fn enqueue(&self, ticket: Ticket) -> Result<(), QueueError>;

    /// Wait for the next ticket and claim it for `worker`.
    /// Fails with `QueueError::Closed` once the queue is closed and drained.
    async fn dequeue(&self, worker: &WorkerId) -> Result<Claim, QueueError>;

    /// Tickets enqueued but not yet claimed
    fn pending(&self) -> usize;

    /// Refuse further tickets and wake idle workers once drained
    fn close(&self);
}
