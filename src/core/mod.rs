//! Core types shared by the engine, the controller and the team layer.
//!
//! This module contains the building blocks that carry no controller logic:
//! - Bit-flag helpers for composite state values
//! - The `State` trait and its engine-side `StateContext`
//! - The `StateFactory` and `ParameterMerger` collaborator traits
//! - Guard predicates and the bounded history stack

pub mod bits;
mod factory;
mod guard;
mod history;
mod merger;
mod state;

pub use factory::StateFactory;
pub use guard::FlagGuard;
pub use history::{HistoryEntry, StateHistory, DEFAULT_MAX_STACK_SIZE};
pub use merger::{JsonMerger, ParameterMerger, ReplaceMerger};
pub use state::{BoxedState, State, StateContext, StateFlags};
