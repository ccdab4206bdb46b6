//! # actionchain: phase-sequenced units of work
//!
//! A [`Unit`] is called strictly in sequence: [`Unit::compute`] on a
//! background executor, followed by either [`Unit::consume`] or
//! [`Unit::handle_error`] on a single foreground dispatcher. Units chain,
//! so the output of one becomes the input of the next, and callers never
//! touch the cross-thread hand-off themselves.
//!
//! ## The Pieces
//!
//! | Piece | Type | What it does |
//! |-------|------|-------------|
//! | Unit | [`Unit`], [`FnUnit`], [`Passthrough`] | compute / consume / handle-error |
//! | Role-tagged unit | [`RoleUnit`], [`Role`] | single-role units that fuse when adjacent |
//! | Chain | [`Chain`] | ordered, append-only sequence of units |
//! | Contexts | [`BackgroundExecutor`], [`ForegroundDispatcher`] | where each phase runs |
//!
//! ## Phases
//!
//! Every execution is driven by a private runner that moves through
//! [`Phase::Computing`] (background), [`Phase::Consuming`] (foreground) and
//! [`Phase::ErrorHandling`] (foreground). A successful consume advances to
//! the next unit's compute. A failure moves to error handling against the
//! unit that failed; a handler that re-raises passes the error to the next
//! unit's handler, and a handler that returns normally ends the execution.
//! An error that is re-raised past the last unit is discarded, so chains
//! that must not lose errors end with a handler.
//!
//! ```no_run
//! use actionchain::{UnitError, UnitExt, role};
//!
//! role::compute(|s: String| s.trim().parse::<i32>().map_err(UnitError::other))
//!     .then(role::compute(|n: i32| Ok(n + 1)))
//!     .then(role::consume(|n: &i32| {
//!         println!("got {n}");
//!         Ok(())
//!     }))
//!     .then(role::on_error(|e| eprintln!("failed: {e}")))
//!     .execute("41".to_string());
//! ```
//!
//! ## Contexts
//!
//! [`Chain::execute`] uses the process-wide defaults from
//! [`context::defaults`]: a [`MainDispatcher`] thread and a background
//! executor chosen by [`DispatchConfig`]. [`Chain::execute_with`] takes an
//! explicit [`Contexts`] pair instead, which is how tests isolate
//! themselves.

#![deny(missing_docs)]

pub mod chain;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod role;
mod runner;
pub mod unit;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-exports for convenience
pub use chain::Chain;
pub use config::{BackgroundMode, DispatchConfig};
pub use context::{BackgroundExecutor, Contexts, ForegroundDispatcher, Work};
pub use dispatch::{MainDispatcher, SerialBackground, TokioBackground};
pub use error::{DispatchError, UnitError};
pub use role::{Role, RoleUnit};
pub use runner::Phase;
pub use unit::{FnUnit, Foreground, Link, Passthrough, Unit, UnitExt};
