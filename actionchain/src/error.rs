//! Error types for units and execution contexts.

use thiserror::Error;

/// Errors raised by a unit's compute, consume or handle-error phase.
///
/// These never reach the caller of `execute`. They are routed to
/// [`Unit::handle_error`](crate::Unit::handle_error) implementations in
/// chain order.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum UnitError {
    /// A plain message, displayed verbatim.
    #[error("{0}")]
    Message(String),

    /// A weakly-held environment was no longer available.
    #[error("environment unavailable: {0}")]
    EnvUnavailable(String),

    /// A value handed between units had an unexpected type.
    #[error("type mismatch: expected {expected}")]
    TypeMismatch {
        /// Name of the type the unit expected.
        expected: &'static str,
    },

    /// Catch-all. Wraps the original cause.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl UnitError {
    /// Create a [`UnitError::Message`].
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wrap any error as [`UnitError::Other`].
    ///
    /// Handy with `map_err`: `s.parse::<i32>().map_err(UnitError::other)`.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(error))
    }

    /// Borrow the wrapped cause if this is [`UnitError::Other`] holding an `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Other(cause) => cause.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub(crate) fn type_mismatch<T>() -> Self {
        Self::TypeMismatch {
            expected: std::any::type_name::<T>(),
        }
    }
}

/// Errors building or installing execution contexts.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A dispatcher or worker thread could not be spawned.
    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The shared background runtime could not be built.
    #[error("failed to build background runtime: {0}")]
    Runtime(String),

    /// The process-wide default contexts were already set.
    #[error("default contexts already installed")]
    AlreadyInstalled,

    /// A configuration value was invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}
