//! A named thread draining an unbounded FIFO of work items.

use crate::context::{ForegroundScope, Work};
use crate::error::DispatchError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{self, ThreadId};
use tokio::sync::mpsc;

/// The sending half of a queue thread. The thread exits once every
/// `QueueThread` handle is dropped and the queue is drained.
pub(crate) struct QueueThread {
    tx: mpsc::UnboundedSender<Work>,
    thread: ThreadId,
    name: String,
}

impl QueueThread {
    /// Spawn the consumer thread. With `foreground` set, the thread is
    /// marked so [`on_foreground`](crate::context::on_foreground) is true
    /// inside its work items.
    pub(crate) fn spawn(name: &str, foreground: bool) -> Result<Self, DispatchError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Work>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _scope = foreground.then(ForegroundScope::enter);
                tracing::debug!(foreground, "queue thread started");
                while let Some(work) = rx.blocking_recv() {
                    if catch_unwind(AssertUnwindSafe(work)).is_err() {
                        tracing::error!("queued work panicked; continuing");
                    }
                }
                tracing::debug!("queue thread stopped");
            })
            .map_err(DispatchError::Spawn)?;
        Ok(Self {
            tx,
            thread: handle.thread().id(),
            name: name.to_string(),
        })
    }

    pub(crate) fn send(&self, work: Work) {
        if self.tx.send(work).is_err() {
            tracing::warn!(thread = %self.name, "queue thread has stopped; work dropped");
        }
    }

    pub(crate) fn is_current(&self) -> bool {
        thread::current().id() == self.thread
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }
}
