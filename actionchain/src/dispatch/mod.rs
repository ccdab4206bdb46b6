//! Concrete execution contexts.
//!
//! [`MainDispatcher`] is the foreground: one named thread draining a FIFO
//! queue. [`TokioBackground`] runs compute on a tokio blocking pool and
//! [`SerialBackground`] runs it one item at a time on a single worker.
//! A panic inside a queued item is caught and logged; the queue thread
//! keeps serving.

mod background;
mod foreground;
mod queue;

pub use background::{SerialBackground, TokioBackground};
pub use foreground::MainDispatcher;
