#![deny(missing_docs)]
//! Weakly-held environment access for actionchain units.
//!
//! A unit that needs some host environment (a window, a session, a
//! connection pool) should not keep it alive just because an execution is
//! still queued. Such units own an [`EnvAccessor`] instead of the
//! environment itself. [`WeakEnv`] is the usual accessor: it holds a
//! [`Weak`] and yields the environment only while something else keeps it
//! alive.
//!
//! The environment can disappear between any two calls, including in the
//! middle of a compute. Sample it once per phase and keep the returned
//! [`Arc`] for the rest of that phase.
//!
//! [`EnvUnit`] composes an accessor with an [`EnvAware`] computation and is
//! itself an ordinary [`Unit`], so it chains like any other.

use actionchain::{Unit, UnitError};
use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

/// Something that may or may not still be able to hand out an `E`.
pub trait EnvAccessor<E: ?Sized>: Send + Sync {
    /// The environment, or `None` once it has been released.
    fn try_get(&self) -> Option<Arc<E>>;

    /// The environment, or [`UnitError::EnvUnavailable`] once it has been
    /// released.
    fn require(&self) -> Result<Arc<E>, UnitError> {
        self.try_get()
            .ok_or_else(|| UnitError::EnvUnavailable(type_name::<E>().to_string()))
    }
}

impl<E, A> EnvAccessor<E> for Arc<A>
where
    E: ?Sized,
    A: EnvAccessor<E> + ?Sized,
{
    fn try_get(&self) -> Option<Arc<E>> {
        (**self).try_get()
    }
}

/// Holds an environment without keeping it alive.
pub struct WeakEnv<E: ?Sized> {
    env: Weak<E>,
}

impl<E: ?Sized> WeakEnv<E> {
    /// Reference `env` weakly.
    pub fn new(env: &Arc<E>) -> Self {
        Self {
            env: Arc::downgrade(env),
        }
    }

    /// Whether the environment has been released.
    pub fn is_released(&self) -> bool {
        self.env.strong_count() == 0
    }

    /// An accessor yielding a narrower view of this environment.
    ///
    /// `project` runs on every access; returning `None` makes the view
    /// unavailable even while the environment itself is alive.
    pub fn map<T, F>(self, project: F) -> Mapped<Self, E, F>
    where
        T: ?Sized,
        F: Fn(Arc<E>) -> Option<Arc<T>> + Send + Sync,
    {
        Mapped {
            inner: self,
            project,
            _env: PhantomData,
        }
    }
}

impl<E: ?Sized> Clone for WeakEnv<E> {
    fn clone(&self) -> Self {
        Self {
            env: Weak::clone(&self.env),
        }
    }
}

impl<E: ?Sized> fmt::Debug for WeakEnv<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEnv")
            .field("type", &type_name::<E>())
            .field("released", &self.is_released())
            .finish()
    }
}

impl<E> EnvAccessor<E> for WeakEnv<E>
where
    E: ?Sized + Send + Sync,
{
    fn try_get(&self) -> Option<Arc<E>> {
        self.env.upgrade()
    }
}

/// A projected view over another accessor, built with [`WeakEnv::map`].
pub struct Mapped<A, E: ?Sized, F> {
    inner: A,
    project: F,
    _env: PhantomData<fn() -> Arc<E>>,
}

impl<A, E, T, F> EnvAccessor<T> for Mapped<A, E, F>
where
    A: EnvAccessor<E>,
    E: ?Sized,
    T: ?Sized,
    F: Fn(Arc<E>) -> Option<Arc<T>> + Send + Sync,
{
    fn try_get(&self) -> Option<Arc<T>> {
        self.inner.try_get().and_then(&self.project)
    }
}

/// A computation that reads its environment through an accessor.
///
/// The three methods mirror [`Unit`]; each receives the accessor so it can
/// decide whether the environment is optional ([`EnvAccessor::try_get`]) or
/// required ([`EnvAccessor::require`]).
pub trait EnvAware<E: ?Sized, P, R>: Send + Sync + 'static {
    /// See [`Unit::compute`].
    fn compute(&self, env: &dyn EnvAccessor<E>, input: P) -> Result<R, UnitError>;

    /// See [`Unit::consume`].
    fn consume(&self, env: &dyn EnvAccessor<E>, output: &R) -> Result<(), UnitError> {
        let _ = (env, output);
        Ok(())
    }

    /// See [`Unit::handle_error`]. Re-raises by default.
    fn handle_error(&self, env: &dyn EnvAccessor<E>, error: UnitError) -> Result<(), UnitError> {
        let _ = env;
        Err(error)
    }
}

/// A [`Unit`] made of an accessor and an [`EnvAware`] computation.
pub struct EnvUnit<E: ?Sized, U> {
    env: Arc<dyn EnvAccessor<E>>,
    unit: U,
}

impl<E, U> EnvUnit<E, U>
where
    E: ?Sized + 'static,
{
    /// Pair `unit` with `env`.
    pub fn new(env: impl EnvAccessor<E> + 'static, unit: U) -> Self {
        Self {
            env: Arc::new(env),
            unit,
        }
    }

    /// The accessor this unit reads through.
    pub fn env(&self) -> &dyn EnvAccessor<E> {
        self.env.as_ref()
    }
}

impl<E, F> EnvUnit<E, RequireEnv<F>>
where
    E: ?Sized + 'static,
{
    /// A compute-only unit that needs the environment.
    ///
    /// The environment is sampled once per call. If it has been released
    /// the compute fails with [`UnitError::EnvUnavailable`] and `f` is not
    /// called.
    pub fn computing<P, R>(env: impl EnvAccessor<E> + 'static, f: F) -> Self
    where
        F: Fn(&E, P) -> Result<R, UnitError> + Send + Sync + 'static,
    {
        Self::new(env, RequireEnv(f))
    }
}

impl<E, U, P, R> Unit<P, R> for EnvUnit<E, U>
where
    E: ?Sized + 'static,
    U: EnvAware<E, P, R>,
{
    fn compute(&self, input: P) -> Result<R, UnitError> {
        self.unit.compute(self.env.as_ref(), input)
    }

    fn consume(&self, output: &R) -> Result<(), UnitError> {
        self.unit.consume(self.env.as_ref(), output)
    }

    fn handle_error(&self, error: UnitError) -> Result<(), UnitError> {
        self.unit.handle_error(self.env.as_ref(), error)
    }
}

impl<E: ?Sized, U> fmt::Debug for EnvUnit<E, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvUnit")
            .field("env", &type_name::<E>())
            .field("unit", &type_name::<U>())
            .finish()
    }
}

/// The computation behind [`EnvUnit::computing`].
pub struct RequireEnv<F>(F);

impl<E, P, R, F> EnvAware<E, P, R> for RequireEnv<F>
where
    E: ?Sized,
    F: Fn(&E, P) -> Result<R, UnitError> + Send + Sync + 'static,
{
    fn compute(&self, env: &dyn EnvAccessor<E>, input: P) -> Result<R, UnitError> {
        let env = env.require().inspect_err(|_| {
            tracing::debug!(env = type_name::<E>(), "environment released before compute");
        })?;
        (self.0)(&*env, input)
    }
}
