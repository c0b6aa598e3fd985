//! In-process WorkQueue implementation.

use crate::domain::jobs::{Ticket, WorkerId};
use crate::ports::queue::{Claim, QueueError, WorkQueue};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// FIFO channel shared by every worker. The receiver sits behind an async
/// mutex so each ticket is taken by exactly one worker.
#[derive(Debug)]
pub struct ChannelQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<Ticket>>>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Ticket>>,
    pending: AtomicUsize,
    capacity: Option<usize>,
}

impl ChannelQueue {
    /// `capacity` of `None` keeps the queue unbounded.
    pub fn new(capacity: Option<usize>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: tokio::sync::Mutex::new(receiver),
            pending: AtomicUsize::new(0),
            capacity,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    fn reserve_slot(&self) -> Result<(), QueueError> {
        match self.capacity {
            Some(capacity) => self
                .pending
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n < capacity).then_some(n + 1)
                })
                .map(|_| ())
                .map_err(|_| QueueError::Full { capacity }),
            None => {
                self.pending.fetch_add(1, Ordering::AcqRel);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl WorkQueue for ChannelQueue {
    async fn enqueue(&self, ticket: Ticket) -> Result<(), QueueError> {
        self.reserve_slot()?;
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let sent = match sender.as_ref() {
            Some(sender) => sender.send(ticket).is_ok(),
            None => false,
        };
        if !sent {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    async fn dequeue(&self, worker: &WorkerId) -> Result<Claim, QueueError> {
        let mut receiver = self.receiver.lock().await;
        match receiver.recv().await {
            Some(ticket) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                Ok(Claim {
                    ticket,
                    worker: worker.clone(),
                })
            }
            None => Err(QueueError::Closed),
        }
    }

    fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }
}
