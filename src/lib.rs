//! Flagstate: a flag-based composite state controller
//!
//! A controller tracks which of up to 31 named states are active, using one
//! bit per state. Several states may be active at once; transitions are
//! expressed as mask operations (add, remove, set, clear) and turned into
//! ordered `on_exit`/`on_enter`/`on_reenter` calls on state objects built by a
//! user-supplied factory.
//!
//! # Core Concepts
//!
//! - **State**: behavior behind one flag, via the `State` trait
//! - **Scopes**: "current" states with history and "global" states without
//! - **Mutex groups**: flags that may never be active together
//! - **Cache**: exited states kept for reuse instead of being disposed
//! - **Teams**: controllers whose matching states follow each other
//! - **Messages**: poolable, delayable values routed to active states
//!
//! # Example
//!
//! ```rust
//! use flagstate::{BoxedState, Controller, ReplaceMerger, State, StateContext};
//!
//! struct Logged(&'static str);
//!
//! impl State for Logged {
//!     type Param = String;
//!     fn name(&self) -> &str {
//!         self.0
//!     }
//!     fn on_enter(&mut self, _ctx: &StateContext<String>) {}
//!     fn on_exit(&mut self, _ctx: &StateContext<String>) {}
//! }
//!
//! const WORK: u32 = 1 << 0;
//! const REST: u32 = 1 << 1;
//!
//! let controller: Controller<String> = Controller::new();
//! controller
//!     .set_state_factory(|flag: u32, _: Option<&String>| -> Option<BoxedState<String>> {
//!         match flag {
//!             WORK => Some(Box::new(Logged("work"))),
//!             REST => Some(Box::new(Logged("rest"))),
//!             _ => None,
//!         }
//!     })
//!     .unwrap();
//! controller.set_parameter_merger(ReplaceMerger).unwrap();
//! controller.add_mutex_state(&[WORK, REST]).unwrap();
//!
//! controller.add_state(WORK, Some("morning".to_string())).unwrap();
//! controller.add_state(REST, None).unwrap();
//! assert_eq!(controller.current_state_flags().unwrap(), REST);
//! ```

pub mod builder;
pub mod checkpoint;
pub mod controller;
pub mod core;
pub mod engine;
pub mod message;
pub mod team;

// Re-export commonly used types
pub use builder::StateTransaction;
pub use checkpoint::{ControllerSnapshot, SnapshotError};
pub use controller::{Controller, ControllerError, WeakController};
pub use core::{BoxedState, FlagGuard, ParameterMerger, ReplaceMerger, State, StateContext};
pub use message::{Message, MessagePolicy, MessageScope};
pub use team::{Cooperation, MemberScope, TeamManager};
