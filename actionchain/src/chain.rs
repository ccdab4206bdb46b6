//! Chains of units.

use crate::context::{self, BackgroundExecutor, Contexts};
use crate::role;
use crate::runner::Runner;
use crate::unit::{Node, Unit};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// An ordered sequence of units taking a `P` and ending with a `V`.
///
/// Built with [`UnitExt::then`](crate::UnitExt::then) or [`Chain::new`],
/// extended with [`then`](Chain::then), and run with one of the
/// `execute` methods. Appending a [`RoleUnit`](crate::RoleUnit) first tries
/// to fuse it into the current tail.
///
/// A chain can be executed any number of times, concurrently. Each
/// execution gets its own cursor and live value over a shared snapshot of
/// the nodes; appending after an execution has started copies the nodes
/// instead of touching the running snapshot.
pub struct Chain<P, V> {
    nodes: Arc<Vec<Node>>,
    _types: PhantomData<fn(P) -> V>,
}

impl<P> Chain<P, P>
where
    P: Send + 'static,
{
    /// A chain with no units. Executing it does nothing.
    pub fn empty() -> Self {
        Self::from_nodes(Arc::new(Vec::new()))
    }
}

impl<P, V> Chain<P, V>
where
    P: Send + 'static,
    V: Send + 'static,
{
    /// A chain holding just `first`.
    pub fn new<U>(first: U) -> Self
    where
        U: Unit<P, V>,
    {
        Chain::<P, P>::empty().then(first)
    }

    fn from_nodes(nodes: Arc<Vec<Node>>) -> Self {
        Self {
            nodes,
            _types: PhantomData,
        }
    }

    /// Append `next`, fusing it into the tail where the roles allow.
    pub fn then<R, U>(mut self, next: U) -> Chain<P, R>
    where
        R: Send + 'static,
        U: Unit<V, R>,
    {
        self.push(next.into_link().node);
        Chain::from_nodes(self.nodes)
    }

    /// Append `next` if present; `None` leaves the chain unchanged.
    pub fn then_optional<U>(self, next: Option<U>) -> Self
    where
        U: Unit<V, V>,
    {
        match next {
            Some(next) => self.then(next),
            None => self,
        }
    }

    fn push(&mut self, node: Node) {
        let nodes = Arc::make_mut(&mut self.nodes);
        if let (Some(Node::Role(tail)), Node::Role(next)) = (nodes.last_mut(), &node) {
            if let Some(fused) = role::fuse(tail, next) {
                *tail = fused;
                return;
            }
        }
        nodes.push(node);
    }

    /// Number of nodes after fusion.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the chain holds no units.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Execute on the process-wide default contexts.
    ///
    /// Fire-and-forget: results surface only through the units' consume
    /// and handle-error phases. If the defaults cannot be built the
    /// execution is dropped and an error is logged.
    pub fn execute(&self, input: P) {
        match context::defaults() {
            Ok(contexts) => self.execute_with(input, &contexts),
            Err(error) => {
                tracing::error!(%error, "default contexts unavailable; execution dropped");
            }
        }
    }

    /// Execute with `background` for compute and the default foreground.
    pub fn execute_on(&self, input: P, background: Arc<dyn BackgroundExecutor>) {
        match context::defaults() {
            Ok(contexts) => self.execute_with(input, &contexts.with_background(background)),
            Err(error) => {
                tracing::error!(%error, "default contexts unavailable; execution dropped");
            }
        }
    }

    /// Execute on explicit contexts.
    pub fn execute_with(&self, input: P, contexts: &Contexts) {
        Runner::start(Arc::clone(&self.nodes), Box::new(input), contexts.clone());
    }
}

impl<P, V> Clone for Chain<P, V> {
    fn clone(&self) -> Self {
        Self {
            nodes: Arc::clone(&self.nodes),
            _types: PhantomData,
        }
    }
}

impl<P, V> fmt::Debug for Chain<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("nodes", &self.nodes.len())
            .finish()
    }
}
