//! Captures phase invocations for assertions.

use crate::context::on_foreground;
use crate::error::UnitError;
use crate::role::{self, RoleUnit};
use crate::runner::Phase;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};

/// One recorded phase invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Label given to the recording unit.
    pub label: String,
    /// Which phase ran.
    pub phase: Phase,
    /// `Debug` of the value, or `Display` of the error.
    pub value: String,
    /// Whether it ran on a foreground context.
    pub on_foreground: bool,
}

/// Shared log of [`Event`]s, plus role-unit constructors that record into it.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event for the calling thread.
    pub fn record(&self, label: &str, phase: Phase, value: String) {
        let event = Event {
            label: label.to_string(),
            phase,
            value,
            on_foreground: on_foreground(),
        };
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Everything recorded so far, in order.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded events of one phase, as `(label, value)` pairs.
    pub fn of(&self, phase: Phase) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter(|event| event.phase == phase)
            .map(|event| (event.label, event.value))
            .collect()
    }

    /// A compute-only role unit that records its input, then applies `f`.
    pub fn compute<P, R, F>(&self, label: &str, f: F) -> RoleUnit<P, R>
    where
        P: Debug + Send + 'static,
        R: Send + 'static,
        F: Fn(P) -> Result<R, UnitError> + Send + Sync + 'static,
    {
        let recorder = self.clone();
        let label = label.to_string();
        role::compute(move |input: P| {
            recorder.record(&label, Phase::Computing, format!("{input:?}"));
            f(input)
        })
    }

    /// A consume-only role unit that records every value it consumes.
    pub fn consume<R>(&self, label: &str) -> RoleUnit<R, R>
    where
        R: Debug + Send + 'static,
    {
        let recorder = self.clone();
        let label = label.to_string();
        role::consume(move |output: &R| {
            recorder.record(&label, Phase::Consuming, format!("{output:?}"));
            Ok(())
        })
    }

    /// An error-handler-only role unit that records and swallows errors.
    pub fn on_error<R>(&self, label: &str) -> RoleUnit<R, R>
    where
        R: Send + 'static,
    {
        let recorder = self.clone();
        let label = label.to_string();
        role::on_error(move |error| {
            recorder.record(&label, Phase::ErrorHandling, error.to_string());
        })
    }
}
