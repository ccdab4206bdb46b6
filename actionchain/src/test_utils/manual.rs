//! Manual contexts: both queues live in memory and the test drains them.

use crate::context::{
    BackgroundExecutor, Contexts, ForegroundDispatcher, Work, run_on_foreground,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Default)]
struct Queue {
    items: Mutex<VecDeque<Work>>,
}

impl Queue {
    fn push(&self, work: Work) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(work);
    }

    fn pop(&self) -> Option<Work> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

struct ManualBackground(Arc<Queue>);

impl BackgroundExecutor for ManualBackground {
    fn submit(&self, work: Work) {
        self.0.push(work);
    }
}

struct ManualForeground(Arc<Queue>);

impl ForegroundDispatcher for ManualForeground {
    fn post(&self, work: Work) {
        self.0.push(work);
    }
}

/// A background queue and a foreground queue that only run when the test
/// drains them, on the test's own thread.
///
/// Foreground items run inside [`run_on_foreground`], so
/// [`on_foreground`](crate::context::on_foreground) tells the two apart.
#[derive(Clone, Default)]
pub struct ManualContexts {
    background: Arc<Queue>,
    foreground: Arc<Queue>,
}

impl ManualContexts {
    /// Create empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Contexts that feed these queues.
    pub fn contexts(&self) -> Contexts {
        Contexts::new(
            Arc::new(ManualBackground(Arc::clone(&self.background))),
            Arc::new(ManualForeground(Arc::clone(&self.foreground))),
        )
    }

    /// Items waiting as `(background, foreground)`.
    pub fn pending(&self) -> (usize, usize) {
        (self.background.len(), self.foreground.len())
    }

    /// Run the oldest background item. Returns `false` if there was none.
    pub fn run_background_step(&self) -> bool {
        match self.background.pop() {
            Some(work) => {
                work();
                true
            }
            None => false,
        }
    }

    /// Run the oldest foreground item. Returns `false` if there was none.
    pub fn run_foreground_step(&self) -> bool {
        match self.foreground.pop() {
            Some(work) => {
                run_on_foreground(work);
                true
            }
            None => false,
        }
    }

    /// Run items until both queues are empty, preferring the foreground.
    /// Returns the number of items run.
    pub fn run_until_idle(&self) -> usize {
        let mut steps = 0;
        while self.run_foreground_step() || self.run_background_step() {
            steps += 1;
        }
        steps
    }
}
