//! Builder API for ergonomic controller use.
//!
//! [`StateTransaction`] chains a guarded add, set or remove, and
//! [`state_flags!`](crate::state_flags) declares named single-bit flags.

pub mod macros;
mod transaction;

pub use transaction::StateTransaction;
