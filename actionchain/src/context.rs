//! Execution contexts: where each phase runs.
//!
//! The engine never spawns threads itself. It submits work to a
//! [`BackgroundExecutor`] (compute) and posts work to a
//! [`ForegroundDispatcher`] (consume and handle-error). Implementations
//! live in [`dispatch`](crate::dispatch); tests can inject their own
//! through [`Contexts`].

use crate::config::{BackgroundMode, DispatchConfig};
use crate::dispatch::{MainDispatcher, SerialBackground, TokioBackground};
use crate::error::DispatchError;
use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A unit of work handed to a context.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Accepts work for asynchronous, possibly parallel execution.
///
/// No ordering guarantee is made between submitted items.
pub trait BackgroundExecutor: Send + Sync {
    /// Run `work` at some point, on some thread.
    fn submit(&self, work: Work);
}

/// A serialized queue with a single consumer.
///
/// Work posted here runs strictly in posting order, one item at a time.
/// Implementations should run each item inside [`run_on_foreground`] (or
/// mark their consumer thread) so that [`on_foreground`] answers
/// correctly.
pub trait ForegroundDispatcher: Send + Sync {
    /// Queue `work` behind everything already posted.
    fn post(&self, work: Work);
}

/// The pair of contexts an execution runs on.
#[derive(Clone)]
pub struct Contexts {
    /// Where compute runs.
    pub background: Arc<dyn BackgroundExecutor>,
    /// Where consume and handle-error run.
    pub foreground: Arc<dyn ForegroundDispatcher>,
}

impl Contexts {
    /// Pair a background executor with a foreground dispatcher.
    pub fn new(
        background: Arc<dyn BackgroundExecutor>,
        foreground: Arc<dyn ForegroundDispatcher>,
    ) -> Self {
        Self {
            background,
            foreground,
        }
    }

    /// Replace the background executor, keeping the foreground dispatcher.
    pub fn with_background(mut self, background: Arc<dyn BackgroundExecutor>) -> Self {
        self.background = background;
        self
    }

    /// Build a fresh dispatcher thread and background executor from `config`.
    ///
    /// In [`BackgroundMode::Parallel`] the background executor uses the
    /// process-wide blocking pool from [`TokioBackground::shared`].
    pub fn from_config(config: &DispatchConfig) -> Result<Self, DispatchError> {
        let foreground = Arc::new(MainDispatcher::spawn(&config.foreground_thread_name)?);
        let background: Arc<dyn BackgroundExecutor> = match config.background {
            BackgroundMode::Parallel => Arc::new(TokioBackground::shared(config)?),
            BackgroundMode::Serial => {
                Arc::new(SerialBackground::spawn(&config.background_thread_name)?)
            }
        };
        Ok(Self::new(background, foreground))
    }
}

impl fmt::Debug for Contexts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contexts").finish_non_exhaustive()
    }
}

/// Process-wide defaults. Set once, never torn down: the foreground
/// dispatcher lives as long as the process.
static DEFAULTS: OnceLock<Contexts> = OnceLock::new();

/// Install the process-wide default contexts.
///
/// Must happen before the first default execution, which otherwise builds
/// defaults from [`DispatchConfig::from_env`], or from
/// [`DispatchConfig::default`] if the environment is invalid.
pub fn install_defaults(contexts: Contexts) -> Result<(), DispatchError> {
    DEFAULTS
        .set(contexts)
        .map_err(|_| DispatchError::AlreadyInstalled)
}

/// The process-wide default contexts, built on first use.
pub fn defaults() -> Result<Contexts, DispatchError> {
    if let Some(contexts) = DEFAULTS.get() {
        return Ok(contexts.clone());
    }
    let config = DispatchConfig::from_env().unwrap_or_else(|error| {
        tracing::warn!(%error, "invalid dispatch configuration; using defaults");
        DispatchConfig::default()
    });
    let built = Contexts::from_config(&config)?;
    // A racing initializer may win; its contexts are used and ours dropped.
    Ok(DEFAULTS.get_or_init(|| built).clone())
}

thread_local! {
    static ON_FOREGROUND: Cell<bool> = const { Cell::new(false) };
}

/// Whether the calling thread is currently running foreground work.
pub fn on_foreground() -> bool {
    ON_FOREGROUND.with(Cell::get)
}

/// Run `work` marked as foreground work on the calling thread.
pub fn run_on_foreground(work: Work) {
    let _scope = ForegroundScope::enter();
    work();
}

/// Marks the current thread as the foreground thread until dropped.
pub(crate) struct ForegroundScope {
    previous: bool,
}

impl ForegroundScope {
    pub(crate) fn enter() -> Self {
        let previous = ON_FOREGROUND.with(|flag| flag.replace(true));
        Self { previous }
    }
}

impl Drop for ForegroundScope {
    fn drop(&mut self) {
        ON_FOREGROUND.with(|flag| flag.set(self.previous));
    }
}
