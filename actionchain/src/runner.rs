//! The per-execution state machine.
//!
//! A runner owns the live value and a cursor into a shared, read-only
//! snapshot of chain nodes. Each step runs one phase of the current node
//! and then hands the runner to the context of the next phase. That
//! hand-off is the only suspension point.

use crate::context::Contexts;
use crate::error::UnitError;
use crate::unit::{Node, Value};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Which phase of a unit is running or about to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// `compute` on the background context.
    Computing,
    /// `consume` on the foreground context.
    Consuming,
    /// `handle_error` on the foreground context.
    ErrorHandling,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Computing => f.write_str("computing"),
            Self::Consuming => f.write_str("consuming"),
            Self::ErrorHandling => f.write_str("error_handling"),
        }
    }
}

/// The live value; its meaning depends on the phase.
enum Live {
    /// Input waiting for compute.
    Computing(Value),
    /// Output waiting for consume.
    Consuming(Value),
    /// An error waiting for a handler.
    ErrorHandling(UnitError),
}

impl Live {
    fn phase(&self) -> Phase {
        match self {
            Self::Computing(_) => Phase::Computing,
            Self::Consuming(_) => Phase::Consuming,
            Self::ErrorHandling(_) => Phase::ErrorHandling,
        }
    }
}

static NEXT_EXECUTION: AtomicU64 = AtomicU64::new(1);

/// Everything about an execution except the live value.
struct Cursor {
    execution: u64,
    nodes: Arc<Vec<Node>>,
    position: usize,
    contexts: Contexts,
}

impl Cursor {
    /// Move to the next node. Returns `false` when the chain is exhausted.
    fn advance(&mut self) -> bool {
        if self.position + 1 < self.nodes.len() {
            self.position += 1;
            true
        } else {
            false
        }
    }
}

pub(crate) struct Runner {
    cursor: Cursor,
    live: Live,
}

impl Runner {
    /// Start an execution of `nodes` on `input`. Returns immediately after
    /// submitting the first compute step to the background context.
    pub(crate) fn start(nodes: Arc<Vec<Node>>, input: Value, contexts: Contexts) {
        let execution = NEXT_EXECUTION.fetch_add(1, Ordering::Relaxed);
        if nodes.is_empty() {
            tracing::debug!(execution, "empty chain; nothing to execute");
            return;
        }
        tracing::debug!(execution, nodes = nodes.len(), "execution started");
        let cursor = Cursor {
            execution,
            nodes,
            position: 0,
            contexts,
        };
        Self::submit(cursor, Live::Computing(input));
    }

    /// Hand the runner to the context its phase runs on.
    fn submit(cursor: Cursor, live: Live) {
        match live.phase() {
            Phase::Computing => {
                let background = Arc::clone(&cursor.contexts.background);
                background.submit(Box::new(move || Runner { cursor, live }.step()));
            }
            Phase::Consuming | Phase::ErrorHandling => {
                let foreground = Arc::clone(&cursor.contexts.foreground);
                foreground.post(Box::new(move || Runner { cursor, live }.step()));
            }
        }
    }

    /// Run the current phase of the current node, then resubmit or finish.
    fn step(self) {
        let Runner { mut cursor, live } = self;
        let nodes = Arc::clone(&cursor.nodes);
        let Some(node) = nodes.get(cursor.position) else {
            return;
        };
        tracing::trace!(
            execution = cursor.execution,
            node = cursor.position,
            phase = %live.phase(),
            "runner step"
        );

        match live {
            Live::Computing(input) => match node.compute(input) {
                Ok(output) => Self::submit(cursor, Live::Consuming(output)),
                Err(error) => Self::submit(cursor, Live::ErrorHandling(error)),
            },
            Live::Consuming(output) => match node.consume(&*output) {
                Ok(()) => {
                    if cursor.advance() {
                        // The consumed output is the next node's input.
                        Self::submit(cursor, Live::Computing(output));
                    } else {
                        tracing::debug!(execution = cursor.execution, "execution completed");
                    }
                }
                // Stay on the foreground; the failing node handles it first.
                Err(error) => Self::submit(cursor, Live::ErrorHandling(error)),
            },
            Live::ErrorHandling(error) => match node.handle_error(error) {
                Ok(()) => {
                    tracing::debug!(
                        execution = cursor.execution,
                        node = cursor.position,
                        "error handled; execution ended"
                    );
                }
                Err(error) => {
                    if cursor.advance() {
                        Self::submit(cursor, Live::ErrorHandling(error));
                    } else {
                        // No sink: the error goes nowhere.
                        tracing::trace!(
                            execution = cursor.execution,
                            "chain exhausted while handling an error"
                        );
                    }
                }
            },
        }
    }
}
