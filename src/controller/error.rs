//! Controller errors.

use thiserror::Error;

/// Errors raised by controller operations.
///
/// Expected-false outcomes (removing an absent state, reverting an empty
/// history, unlocking a key that is not locked) are `Ok(false)`, never errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("State factory not set. Call .set_state_factory(factory) first")]
    MissingStateFactory,

    #[error("Parameter merger not set. Call .set_parameter_merger(merger) first")]
    MissingParameterMerger,

    #[error("State factory returned no state for flag {flag:#x}")]
    StateNotCreated { flag: u32 },

    #[error("State stack is disabled. Call .set_state_stack_enabled(true) first")]
    StateStackDisabled,

    #[error("Message {what} is already in use")]
    MessageInUse { what: i32 },

    #[error("Controller has been disposed")]
    Disposed,

    #[error("State is detached from its controller")]
    Detached,

    #[error("Controller is busy dispatching a transition")]
    Busy,

    #[error("Transaction is incomplete: {missing} not specified")]
    IncompleteTransaction { missing: &'static str },

    /// A composite request spans a registered mutex relation.
    #[error("Flags {flags:#x} contain mutually exclusive states: {pairs:?}")]
    MutexConflict { flags: u32, pairs: Vec<(u32, u32)> },

    #[error("Invalid state flags {flags:#x}: expected a positive composite without bit 31")]
    InvalidFlags { flags: u32 },

    #[error("At least one key is required")]
    EmptyKeys,

    #[error("Mutex group must contain at least one flag")]
    EmptyMutexGroup,
}

pub type Result<T> = std::result::Result<T, ControllerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_point_at_the_fix() {
        assert!(ControllerError::MissingStateFactory
            .to_string()
            .contains("set_state_factory"));
        assert!(ControllerError::StateStackDisabled
            .to_string()
            .contains("set_state_stack_enabled"));
    }

    #[test]
    fn flags_render_in_hex() {
        let err = ControllerError::MutexConflict {
            flags: 0x6,
            pairs: vec![(4, 2)],
        };
        assert_eq!(
            err.to_string(),
            "Flags 0x6 contain mutually exclusive states: [(4, 2)]"
        );
        assert_eq!(
            ControllerError::StateNotCreated { flag: 8 }.to_string(),
            "State factory returned no state for flag 0x8"
        );
    }
}
