//! State construction.

use super::state::BoxedState;

/// Produces the state instance for a single-bit flag.
///
/// The engine never constructs concrete states itself. Returning `None` for a
/// requested flag is a configuration error and aborts the transition.
pub trait StateFactory<P> {
    fn create_state(&self, flag: u32, param: Option<&P>) -> Option<BoxedState<P>>;
}

impl<P, F> StateFactory<P> for F
where
    F: Fn(u32, Option<&P>) -> Option<BoxedState<P>>,
{
    fn create_state(&self, flag: u32, param: Option<&P>) -> Option<BoxedState<P>> {
        self(flag, param)
    }
}
