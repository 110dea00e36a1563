//! Instance registry shared by the current and global groups.

use crate::core::{BoxedState, StateContext};
use std::collections::BTreeMap;

/// A state instance together with the engine's bookkeeping for it.
pub struct StateEntry<P> {
    pub state: BoxedState<P>,
    pub ctx: StateContext<P>,
}

impl<P: 'static> StateEntry<P> {
    pub(crate) fn new(flag: u32, state: BoxedState<P>) -> Self {
        Self {
            state,
            ctx: StateContext::new(flag),
        }
    }

    pub fn name(&self) -> &str {
        self.state.name()
    }
}

/// Single-bit flag to instance. The only source of truth for whether an
/// instance exists for a bit.
pub(crate) type Registry<P> = BTreeMap<u32, StateEntry<P>>;
