//! Background executors.

use super::queue::QueueThread;
use crate::config::DispatchConfig;
use crate::context::{BackgroundExecutor, Work};
use crate::error::DispatchError;
use std::fmt;
use std::sync::OnceLock;
use tokio::runtime::{Builder, Handle, Runtime};

/// Runs each work item with `spawn_blocking` on a tokio runtime.
///
/// Items may run in parallel and in any order.
#[derive(Clone)]
pub struct TokioBackground {
    handle: Handle,
}

/// Shared blocking pool for [`TokioBackground::shared`]. Never dropped.
static SHARED_RUNTIME: OnceLock<Result<Runtime, String>> = OnceLock::new();

impl TokioBackground {
    /// Use the runtime behind `handle`.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running inside, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Use the process-wide blocking pool, building it on first call.
    ///
    /// The first caller's `config` decides the thread name and the
    /// blocking thread cap; later configs are ignored.
    pub fn shared(config: &DispatchConfig) -> Result<Self, DispatchError> {
        let runtime = SHARED_RUNTIME.get_or_init(|| {
            let mut builder = Builder::new_multi_thread();
            builder
                .worker_threads(1)
                .thread_name(config.background_thread_name.clone());
            if let Some(threads) = config.max_blocking_threads {
                builder.max_blocking_threads(threads);
            }
            builder.build().map_err(|e| e.to_string())
        });
        match runtime {
            Ok(runtime) => Ok(Self::new(runtime.handle().clone())),
            Err(e) => Err(DispatchError::Runtime(e.clone())),
        }
    }
}

impl BackgroundExecutor for TokioBackground {
    fn submit(&self, work: Work) {
        // Detached: the runner resubmits itself, nobody awaits the handle.
        drop(self.handle.spawn_blocking(work));
    }
}

impl fmt::Debug for TokioBackground {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioBackground").finish_non_exhaustive()
    }
}

/// Runs work one item at a time, in submission order, on a single
/// dedicated worker thread.
pub struct SerialBackground {
    queue: QueueThread,
}

impl SerialBackground {
    /// Spawn a worker thread called `name`.
    pub fn spawn(name: &str) -> Result<Self, DispatchError> {
        Ok(Self {
            queue: QueueThread::spawn(name, false)?,
        })
    }

    /// Whether the caller is running on this executor's worker.
    pub fn is_current(&self) -> bool {
        self.queue.is_current()
    }
}

impl BackgroundExecutor for SerialBackground {
    fn submit(&self, work: Work) {
        self.queue.send(work);
    }
}

impl fmt::Debug for SerialBackground {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialBackground")
            .field("thread", &self.queue.name())
            .finish()
    }
}
