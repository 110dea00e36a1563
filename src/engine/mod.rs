//! State composition engine.
//!
//! The engine is the part of a controller that turns mask operations into
//! ordered lifecycle calls. It knows nothing about teams or message queues;
//! transitions are reported as [`TransitionReport`]s for the controller to
//! forward.

mod group;
mod mutex;
mod registry;

pub use group::{Scope, TransitionKind, TransitionReport};
pub use mutex::MutexTable;
pub use registry::StateEntry;

pub(crate) use group::{GroupEnv, GroupOp, StateGroup};
pub(crate) use registry::Registry;
