//! Per-user delivery queue
//!
//! An unbounded FIFO guarded by a mutex, paired with a [`Notify`] so that
//! `dequeue` can wait for work without spinning. Producers (rooms
//! broadcasting on behalf of senders) never wait; the single consumer is the
//! receiver worker that owns the user.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::debug;

use crate::message::Message;

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<Message>,
    closed: bool,
}

/// Unbounded blocking message queue
#[derive(Debug, Default)]
pub struct Mailbox {
    inner: Mutex<Inner>,
    available: Notify,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a message and wake the consumer. Never waits.
    ///
    /// Messages sent to a closed mailbox are dropped.
    pub fn enqueue(&self, msg: Message) {
        {
            let mut inner = self.lock();
            if inner.closed {
                return;
            }
            inner.queue.push_back(msg);
        }
        self.available.notify_one();
    }

    /// Wait for the oldest message and remove it
    ///
    /// Returns `None` only once the mailbox has been closed.
    pub async fn dequeue(&self) -> Option<Message> {
        loop {
            {
                let mut inner = self.lock();
                if inner.closed {
                    return None;
                }
                if let Some(msg) = inner.queue.pop_front() {
                    return Some(msg);
                }
            }
            // notify_one stores a permit when nobody is waiting yet, so an
            // enqueue between the check above and this await is not lost.
            self.available.notified().await;
        }
    }

    /// Discard pending messages and release any waiting consumer
    pub fn close(&self) {
        let discarded = {
            let mut inner = self.lock();
            inner.closed = true;
            std::mem::take(&mut inner.queue).len()
        };
        if discarded > 0 {
            debug!("Mailbox closed, {} undelivered message(s) discarded", discarded);
        }
        self.available.notify_waiters();
        self.available.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of messages waiting
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for Mailbox {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !inner.queue.is_empty() {
            debug!(
                "Mailbox dropped with {} undelivered message(s)",
                inner.queue.len()
            );
        }
    }
}
