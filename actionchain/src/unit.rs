//! The Unit trait, the smallest schedulable piece of chainable work.

use crate::chain::Chain;
use crate::context::{BackgroundExecutor, Contexts};
use crate::error::UnitError;
use crate::role::RoleNode;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

/// A value travelling between units with its type erased.
pub(crate) type Value = Box<dyn Any + Send>;

/// A unit of work called strictly in sequence: [`compute`](Unit::compute)
/// on the background context, then either [`consume`](Unit::consume) or
/// [`handle_error`](Unit::handle_error) on the foreground context.
///
/// `compute` should behave as a function with no side effects. That is
/// what makes units safe to chain: the output of one unit becomes the
/// input of the next.
///
/// Implement this trait directly when a unit needs all three phases. For
/// single-phase units use the constructors in [`role`](crate::role), which
/// can be fused with their neighbours when chained, or [`FnUnit`] for any
/// subset of the three functions.
pub trait Unit<P, R>: Send + Sync + 'static {
    /// Process `input` on the background context.
    ///
    /// An error is delivered to [`handle_error`](Unit::handle_error) of
    /// this same unit.
    fn compute(&self, input: P) -> Result<R, UnitError>;

    /// Consume the value returned by [`compute`](Unit::compute) on the
    /// foreground context. Not called when `compute` failed.
    ///
    /// An error here is delivered to [`handle_error`](Unit::handle_error)
    /// of this same unit. Keep it short: every chain in the process shares
    /// the foreground context.
    fn consume(&self, output: &R) -> Result<(), UnitError> {
        let _ = output;
        Ok(())
    }

    /// Handle an error raised by this unit, or re-raised by an earlier
    /// unit's handler, on the foreground context.
    ///
    /// Returning `Ok` swallows the error and ends the execution; no later
    /// unit runs. Returning `Err` (the default re-raises `error` unchanged)
    /// passes it to the next unit's handler.
    fn handle_error(&self, error: UnitError) -> Result<(), UnitError> {
        Err(error)
    }

    /// Convert into a chain link.
    ///
    /// Opaque units never fuse. [`RoleUnit`](crate::RoleUnit) overrides
    /// this to hand over its role so the chain can fuse it.
    fn into_link(self) -> Link<P, R>
    where
        Self: Sized,
        P: Send + 'static,
        R: Send + 'static,
    {
        Link::opaque(self)
    }
}

impl<P, R, U> Unit<P, R> for Arc<U>
where
    U: Unit<P, R> + ?Sized,
{
    fn compute(&self, input: P) -> Result<R, UnitError> {
        (**self).compute(input)
    }

    fn consume(&self, output: &R) -> Result<(), UnitError> {
        (**self).consume(output)
    }

    fn handle_error(&self, error: UnitError) -> Result<(), UnitError> {
        (**self).handle_error(error)
    }
}

/// Chaining and execution for every [`Unit`].
pub trait UnitExt<P, R>: Unit<P, R> + Sized {
    /// Start a chain with this unit followed by `next`.
    fn then<T, U>(self, next: U) -> Chain<P, T>
    where
        U: Unit<R, T>,
        P: Send + 'static,
        R: Send + 'static,
        T: Send + 'static,
    {
        Chain::new(self).then(next)
    }

    /// Execute this unit alone on the process-wide default contexts.
    fn execute(self, input: P)
    where
        P: Send + 'static,
        R: Send + 'static,
    {
        Chain::new(self).execute(input);
    }

    /// Execute this unit alone with an explicit background executor.
    fn execute_on(self, input: P, background: Arc<dyn BackgroundExecutor>)
    where
        P: Send + 'static,
        R: Send + 'static,
    {
        Chain::new(self).execute_on(input, background);
    }

    /// Execute this unit alone on explicit contexts.
    fn execute_with(self, input: P, contexts: &Contexts)
    where
        P: Send + 'static,
        R: Send + 'static,
    {
        Chain::new(self).execute_with(input, contexts);
    }
}

impl<P, R, U> UnitExt<P, R> for U where U: Unit<P, R> {}

type ComputeBox<P, R> = Box<dyn Fn(P) -> Result<R, UnitError> + Send + Sync>;
type ConsumeBox<R> = Box<dyn Fn(&R) -> Result<(), UnitError> + Send + Sync>;
type HandlerBox = Box<dyn Fn(UnitError) -> Result<(), UnitError> + Send + Sync>;

/// A [`Unit`] assembled from any subset of the three phase functions.
///
/// Without a compute function the unit produces `R::default()` whatever
/// its input, so a consume-only `FnUnit<String, String>` always consumes
/// `""`. Unlike [`RoleUnit`](crate::RoleUnit), an `FnUnit` never fuses.
pub struct FnUnit<P, R> {
    compute: ComputeBox<P, R>,
    consume: Option<ConsumeBox<R>>,
    on_error: Option<HandlerBox>,
}

impl<P, R> FnUnit<P, R>
where
    P: 'static,
    R: Default + 'static,
{
    /// A unit whose compute returns `R::default()`.
    pub fn new() -> Self {
        Self::computing(|_| Ok(R::default()))
    }
}

impl<P, R> Default for FnUnit<P, R>
where
    P: 'static,
    R: Default + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, R> FnUnit<P, R> {
    /// A unit with the given compute function.
    pub fn computing<F>(compute: F) -> Self
    where
        F: Fn(P) -> Result<R, UnitError> + Send + Sync + 'static,
    {
        Self {
            compute: Box::new(compute),
            consume: None,
            on_error: None,
        }
    }

    /// Set the consume function.
    pub fn on_consume<F>(mut self, consume: F) -> Self
    where
        F: Fn(&R) -> Result<(), UnitError> + Send + Sync + 'static,
    {
        self.consume = Some(Box::new(consume));
        self
    }

    /// Set the handle-error function. Returning `Err` re-raises.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(UnitError) -> Result<(), UnitError> + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(handler));
        self
    }
}

impl<P, R> Unit<P, R> for FnUnit<P, R>
where
    P: 'static,
    R: 'static,
{
    fn compute(&self, input: P) -> Result<R, UnitError> {
        (self.compute)(input)
    }

    fn consume(&self, output: &R) -> Result<(), UnitError> {
        match &self.consume {
            Some(consume) => consume(output),
            None => Ok(()),
        }
    }

    fn handle_error(&self, error: UnitError) -> Result<(), UnitError> {
        match &self.on_error {
            Some(handler) => handler(error),
            None => Err(error),
        }
    }
}

/// The foreground half of a unit whose compute passes its input through.
///
/// Implement this when a unit only reacts to a value or an error, and wrap
/// it in [`Passthrough`] to get a [`Unit`]. Both methods default like their
/// [`Unit`] counterparts.
pub trait Foreground<R>: Send + Sync + 'static {
    /// See [`Unit::consume`].
    fn consume(&self, value: &R) -> Result<(), UnitError> {
        let _ = value;
        Ok(())
    }

    /// See [`Unit::handle_error`].
    fn handle_error(&self, error: UnitError) -> Result<(), UnitError> {
        Err(error)
    }
}

/// A [`Unit`] with identity compute around a [`Foreground`] implementation.
///
/// Unlike [`role::identity`](crate::role::identity) it carries both a
/// consume and a handler, and it never fuses.
#[derive(Debug, Clone, Default)]
pub struct Passthrough<U>(pub U);

impl<R, U> Unit<R, R> for Passthrough<U>
where
    U: Foreground<R>,
{
    fn compute(&self, input: R) -> Result<R, UnitError> {
        Ok(input)
    }

    fn consume(&self, output: &R) -> Result<(), UnitError> {
        self.0.consume(output)
    }

    fn handle_error(&self, error: UnitError) -> Result<(), UnitError> {
        self.0.handle_error(error)
    }
}

/// A unit prepared for appending to a [`Chain`].
///
/// Either an opaque unit, or a role-tagged node that the chain may fuse
/// into its current tail.
pub struct Link<P, R> {
    pub(crate) node: Node,
    _types: PhantomData<fn(P) -> R>,
}

impl<P, R> Link<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Wrap a unit that never fuses.
    pub fn opaque<U>(unit: U) -> Self
    where
        U: Unit<P, R>,
    {
        Self::from_node(Node::Opaque(Arc::new(Opaque {
            unit,
            _types: PhantomData,
        })))
    }

    pub(crate) fn role(node: RoleNode) -> Self {
        Self::from_node(Node::Role(node))
    }

    fn from_node(node: Node) -> Self {
        Self {
            node,
            _types: PhantomData,
        }
    }
}

/// One position in a chain, with its input and output types erased.
#[derive(Clone)]
pub(crate) enum Node {
    Opaque(Arc<dyn ErasedUnit>),
    Role(RoleNode),
}

impl Node {
    pub(crate) fn compute(&self, input: Value) -> Result<Value, UnitError> {
        match self {
            Self::Opaque(unit) => unit.compute(input),
            Self::Role(node) => node.compute(input),
        }
    }

    pub(crate) fn consume(&self, output: &(dyn Any + Send)) -> Result<(), UnitError> {
        match self {
            Self::Opaque(unit) => unit.consume(output),
            Self::Role(node) => node.consume(output),
        }
    }

    pub(crate) fn handle_error(&self, error: UnitError) -> Result<(), UnitError> {
        match self {
            Self::Opaque(unit) => unit.handle_error(error),
            Self::Role(node) => node.handle_error(error),
        }
    }
}

pub(crate) trait ErasedUnit: Send + Sync {
    fn compute(&self, input: Value) -> Result<Value, UnitError>;
    fn consume(&self, output: &(dyn Any + Send)) -> Result<(), UnitError>;
    fn handle_error(&self, error: UnitError) -> Result<(), UnitError>;
}

struct Opaque<U, P, R> {
    unit: U,
    _types: PhantomData<fn(P) -> R>,
}

impl<U, P, R> ErasedUnit for Opaque<U, P, R>
where
    U: Unit<P, R>,
    P: Send + 'static,
    R: Send + 'static,
{
    fn compute(&self, input: Value) -> Result<Value, UnitError> {
        let input = unbox::<P>(input)?;
        let output = self.unit.compute(input)?;
        Ok(Box::new(output))
    }

    fn consume(&self, output: &(dyn Any + Send)) -> Result<(), UnitError> {
        let output = output
            .downcast_ref::<R>()
            .ok_or_else(UnitError::type_mismatch::<R>)?;
        self.unit.consume(output)
    }

    fn handle_error(&self, error: UnitError) -> Result<(), UnitError> {
        self.unit.handle_error(error)
    }
}

pub(crate) fn unbox<T: 'static>(value: Value) -> Result<T, UnitError> {
    value
        .downcast::<T>()
        .map(|value| *value)
        .map_err(|_| UnitError::type_mismatch::<T>())
}
