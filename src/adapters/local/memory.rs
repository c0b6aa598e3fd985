//! In-process JobStore implementation.

use crate::domain::jobs::{JobError, JobRecord, Ticket};
use crate::domain::workspace::Workspace;
use crate::ports::repository::{JobMutation, JobStore};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Job table held in memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<Ticket, JobRecord>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, ticket: Ticket, workspace: Workspace) -> Result<JobRecord, JobError> {
        match self.jobs.entry(ticket.clone()) {
            Entry::Occupied(_) => Err(JobError::AlreadyExists(ticket)),
            Entry::Vacant(slot) => {
                let record = JobRecord::new(ticket, workspace);
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn get(&self, ticket: &Ticket) -> Result<JobRecord, JobError> {
        self.jobs
            .get(ticket)
            .map(|record| record.clone())
            .ok_or_else(|| JobError::NotFound(ticket.clone()))
    }

    async fn update(&self, ticket: &Ticket, mutation: JobMutation) -> Result<JobRecord, JobError> {
        // The shard stays write-locked until `entry` is dropped.
        let mut entry = self
            .jobs
            .get_mut(ticket)
            .ok_or_else(|| JobError::NotFound(ticket.clone()))?;
        let mut next = entry.clone();
        mutation(&mut next)?;
        *entry = next.clone();
        Ok(next)
    }

    async fn remove(&self, ticket: &Ticket) -> Option<JobRecord> {
        self.jobs.remove(ticket).map(|(_, record)| record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::jobs::{JobStatus, WorkerId};
    use std::sync::Arc;

    fn workspace_for(ticket: &Ticket) -> Workspace {
        Workspace::new(std::env::temp_dir().join(ticket.as_str()))
    }

    #[tokio::test]
    async fn create_then_get() {
        let store = InMemoryJobStore::new();
        let ticket = Ticket::generate();
        store
            .create(ticket.clone(), workspace_for(&ticket))
            .await
            .unwrap();

        let record = store.get(&ticket).await.unwrap();
        assert_eq!(record.status(), JobStatus::Queued);
        assert_eq!(record.ticket(), &ticket);
    }

    #[tokio::test]
    async fn duplicate_ticket_is_rejected() {
        let store = InMemoryJobStore::new();
        let ticket = Ticket::generate();
        store
            .create(ticket.clone(), workspace_for(&ticket))
            .await
            .unwrap();
        let err = store
            .create(ticket.clone(), workspace_for(&ticket))
            .await
            .unwrap_err();
        assert_eq!(err, JobError::AlreadyExists(ticket));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn unknown_ticket_is_not_found() {
        let store = InMemoryJobStore::new();
        let ticket = Ticket::from("nope");
        assert_eq!(
            store.get(&ticket).await.unwrap_err(),
            JobError::NotFound(ticket.clone())
        );
        let err = store
            .update(
                &ticket,
                Box::new(|record: &mut JobRecord| record.claim(WorkerId::new(0))),
            )
            .await
            .unwrap_err();
        assert_eq!(err, JobError::NotFound(ticket.clone()));
        assert!(store.remove(&ticket).await.is_none());
    }

    #[tokio::test]
    async fn rejected_mutation_leaves_record_unchanged() {
        let store = InMemoryJobStore::new();
        let ticket = Ticket::generate();
        store
            .create(ticket.clone(), workspace_for(&ticket))
            .await
            .unwrap();

        let result = store
            .update(
                &ticket,
                Box::new(|record: &mut JobRecord| {
                    record.claim(WorkerId::new(0))?;
                    // second claim is invalid, so the first must not stick
                    record.claim(WorkerId::new(1))
                }),
            )
            .await;
        assert!(result.is_err());

        let record = store.get(&ticket).await.unwrap();
        assert_eq!(record.status(), JobStatus::Queued);
        assert!(record.assigned_worker().is_none());
    }

    #[tokio::test]
    async fn remove_deletes_the_record() {
        let store = InMemoryJobStore::new();
        let ticket = Ticket::generate();
        store
            .create(ticket.clone(), workspace_for(&ticket))
            .await
            .unwrap();

        assert!(store.remove(&ticket).await.is_some());
        assert!(store.remove(&ticket).await.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_admit_one_winner() {
        let store = Arc::new(InMemoryJobStore::new());
        let ticket = Ticket::generate();
        store
            .create(ticket.clone(), workspace_for(&ticket))
            .await
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let ticket = ticket.clone();
                tokio::spawn(async move {
                    let claim = move |record: &mut JobRecord| record.claim(WorkerId::new(i));
                    store.update(&ticket, Box::new(claim)).await.is_ok()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(
            store.get(&ticket).await.unwrap().status(),
            JobStatus::Processing
        );
    }
}
