//! The state controller.
//!
//! A [`Controller`] owns two scopes of active states, a registry of state
//! instances, mutex rules, a state stack, locked event keys and a delayed
//! message queue. All mutation goes through the handle; engine internals
//! live in `core`.

mod core;
mod error;
mod handle;

pub use error::{ControllerError, Result};
pub use handle::{Controller, WeakController};
