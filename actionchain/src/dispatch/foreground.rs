//! The foreground dispatcher.

use super::queue::QueueThread;
use crate::context::{ForegroundDispatcher, Work};
use crate::error::DispatchError;
use std::fmt;

/// A foreground dispatcher backed by one dedicated OS thread.
///
/// Everything posted runs on that thread in posting order. The thread
/// stops once the dispatcher and every execution still holding it are
/// dropped; the process-wide default is never dropped.
pub struct MainDispatcher {
    queue: QueueThread,
}

impl MainDispatcher {
    /// Spawn a dispatcher thread called `name`.
    pub fn spawn(name: &str) -> Result<Self, DispatchError> {
        Ok(Self {
            queue: QueueThread::spawn(name, true)?,
        })
    }

    /// Whether the caller is running on this dispatcher's thread.
    pub fn is_current(&self) -> bool {
        self.queue.is_current()
    }
}

impl ForegroundDispatcher for MainDispatcher {
    fn post(&self, work: Work) {
        self.queue.send(work);
    }
}

impl fmt::Debug for MainDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainDispatcher")
            .field("thread", &self.queue.name())
            .finish()
    }
}
