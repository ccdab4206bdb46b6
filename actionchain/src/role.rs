//! Role-tagged units and the fusion table.
//!
//! A [`RoleUnit`] plays exactly one [`Role`]. When a role unit is appended
//! to a [`Chain`](crate::Chain) whose tail is also a role node, the two may
//! be fused into one node:
//!
//! | tail | next | fused node |
//! |------|------|-----------|
//! | Compute | Compute | `x ↦ next(tail(x))` |
//! | Consume | Consume | `x ↦ { tail(x); next(x) }` |
//! | Compute | Consume | tail's compute, next's consume |
//! | ErrorHandler | ErrorHandler | next's handler replaces tail's |
//!
//! Every other pairing appends a new node. Fusion saves a hand-off per
//! trivial step; the consume and handle-error calls observed by callers,
//! their values and their order are the same as without it.

use crate::error::UnitError;
use crate::unit::{Link, Unit, Value, unbox};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

pub(crate) type ComputeFn = Arc<dyn Fn(Value) -> Result<Value, UnitError> + Send + Sync>;
pub(crate) type ConsumeFn = Arc<dyn Fn(&(dyn Any + Send)) -> Result<(), UnitError> + Send + Sync>;
pub(crate) type ErrorFn = Arc<dyn Fn(UnitError) + Send + Sync>;

/// The single role a [`RoleUnit`] plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Only a compute function.
    Compute,
    /// Only a consume function; compute passes its input through.
    Consume,
    /// Only an error handler, which swallows every error it receives.
    ErrorHandler,
    /// Nothing at all: passes values through and re-raises errors.
    Identity,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Compute => "compute",
            Self::Consume => "consume",
            Self::ErrorHandler => "error_handler",
            Self::Identity => "identity",
        };
        f.write_str(name)
    }
}

/// What a role node currently carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    Single(Role),
    /// A compute fused with a following consume.
    ComputeConsume,
}

/// How two adjacent role nodes merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fusion {
    ComposeCompute,
    SequenceConsume,
    AttachConsume,
    ReplaceErrorHandler,
}

/// The fusion table. `None` means append `next` as its own node.
pub(crate) fn fusion_for(tail: Shape, next: Role) -> Option<Fusion> {
    match (tail, next) {
        (Shape::Single(Role::Compute), Role::Compute) => Some(Fusion::ComposeCompute),
        (Shape::Single(Role::Consume), Role::Consume) => Some(Fusion::SequenceConsume),
        (Shape::Single(Role::Compute), Role::Consume) => Some(Fusion::AttachConsume),
        (Shape::Single(Role::ErrorHandler), Role::ErrorHandler) => {
            Some(Fusion::ReplaceErrorHandler)
        }
        _ => None,
    }
}

/// Erased storage behind a [`RoleUnit`]. Absent slots mean identity
/// compute, no-op consume and re-raising handler.
#[derive(Clone, Default)]
pub(crate) struct RoleNode {
    compute: Option<ComputeFn>,
    consume: Option<ConsumeFn>,
    on_error: Option<ErrorFn>,
}

impl RoleNode {
    pub(crate) fn shape(&self) -> Option<Shape> {
        match (&self.compute, &self.consume, &self.on_error) {
            (Some(_), None, None) => Some(Shape::Single(Role::Compute)),
            (None, Some(_), None) => Some(Shape::Single(Role::Consume)),
            (None, None, Some(_)) => Some(Shape::Single(Role::ErrorHandler)),
            (None, None, None) => Some(Shape::Single(Role::Identity)),
            (Some(_), Some(_), None) => Some(Shape::ComputeConsume),
            _ => None,
        }
    }

    fn role(&self) -> Option<Role> {
        match self.shape()? {
            Shape::Single(role) => Some(role),
            Shape::ComputeConsume => None,
        }
    }

    pub(crate) fn compute(&self, input: Value) -> Result<Value, UnitError> {
        match &self.compute {
            Some(compute) => compute(input),
            None => Ok(input),
        }
    }

    pub(crate) fn consume(&self, output: &(dyn Any + Send)) -> Result<(), UnitError> {
        match &self.consume {
            Some(consume) => consume(output),
            None => Ok(()),
        }
    }

    pub(crate) fn handle_error(&self, error: UnitError) -> Result<(), UnitError> {
        match &self.on_error {
            Some(handler) => {
                handler(error);
                Ok(())
            }
            None => Err(error),
        }
    }
}

/// Fuse `next` into `tail`, or `None` when the pair does not fuse.
pub(crate) fn fuse(tail: &RoleNode, next: &RoleNode) -> Option<RoleNode> {
    let fusion = fusion_for(tail.shape()?, next.role()?)?;
    let fused = match fusion {
        Fusion::ComposeCompute => {
            let first = tail.compute.clone()?;
            let second = next.compute.clone()?;
            RoleNode {
                compute: Some(Arc::new(move |input: Value| second(first(input)?))),
                ..RoleNode::default()
            }
        }
        Fusion::SequenceConsume => {
            let first = tail.consume.clone()?;
            let second = next.consume.clone()?;
            RoleNode {
                consume: Some(Arc::new(move |output: &(dyn Any + Send)| {
                    first(output)?;
                    second(output)
                })),
                ..RoleNode::default()
            }
        }
        Fusion::AttachConsume => RoleNode {
            compute: tail.compute.clone(),
            consume: next.consume.clone(),
            on_error: None,
        },
        Fusion::ReplaceErrorHandler => RoleNode {
            on_error: next.on_error.clone(),
            ..tail.clone()
        },
    };
    Some(fused)
}

/// A unit that plays a single [`Role`], built with [`compute`],
/// [`consume`], [`on_error`] or [`identity`].
pub struct RoleUnit<P, R> {
    node: RoleNode,
    _types: PhantomData<fn(P) -> R>,
}

impl<P, R> RoleUnit<P, R> {
    fn new(node: RoleNode) -> Self {
        Self {
            node,
            _types: PhantomData,
        }
    }

    /// The role this unit plays.
    pub fn role(&self) -> Role {
        // Only chain nodes are ever fused; a RoleUnit always has one role.
        self.node.role().unwrap_or(Role::Compute)
    }
}

impl<P, R> Clone for RoleUnit<P, R> {
    fn clone(&self) -> Self {
        Self::new(self.node.clone())
    }
}

impl<P, R> fmt::Debug for RoleUnit<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleUnit").field("role", &self.role()).finish()
    }
}

impl<P, R> Unit<P, R> for RoleUnit<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    fn compute(&self, input: P) -> Result<R, UnitError> {
        unbox::<R>(self.node.compute(Box::new(input))?)
    }

    fn consume(&self, output: &R) -> Result<(), UnitError> {
        self.node.consume(output)
    }

    fn handle_error(&self, error: UnitError) -> Result<(), UnitError> {
        self.node.handle_error(error)
    }

    fn into_link(self) -> Link<P, R> {
        Link::role(self.node)
    }
}

/// A compute-only unit.
pub fn compute<P, R, F>(f: F) -> RoleUnit<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
    F: Fn(P) -> Result<R, UnitError> + Send + Sync + 'static,
{
    RoleUnit::new(RoleNode {
        compute: Some(Arc::new(move |input: Value| {
            let output = f(unbox::<P>(input)?)?;
            Ok(Box::new(output) as Value)
        })),
        ..RoleNode::default()
    })
}

/// A consume-only unit. Its compute passes the input through unchanged.
pub fn consume<R, F>(f: F) -> RoleUnit<R, R>
where
    R: Send + 'static,
    F: Fn(&R) -> Result<(), UnitError> + Send + Sync + 'static,
{
    RoleUnit::new(RoleNode {
        consume: Some(Arc::new(move |output: &(dyn Any + Send)| {
            let output = output
                .downcast_ref::<R>()
                .ok_or_else(UnitError::type_mismatch::<R>)?;
            f(output)
        })),
        ..RoleNode::default()
    })
}

/// An error-handler-only unit. The handler swallows the error, which ends
/// the execution. Values pass through unchanged.
pub fn on_error<R, F>(f: F) -> RoleUnit<R, R>
where
    R: Send + 'static,
    F: Fn(UnitError) + Send + Sync + 'static,
{
    RoleUnit::new(RoleNode {
        on_error: Some(Arc::new(f)),
        ..RoleNode::default()
    })
}

/// A unit that does nothing: values pass through and errors are re-raised.
pub fn identity<R>() -> RoleUnit<R, R>
where
    R: Send + 'static,
{
    RoleUnit::new(RoleNode::default())
}
