//! Cross-controller teams.
//!
//! A team groups members (controller, state mask, cooperation mode). When a
//! state of a formal member enters, exits or reenters, the team's callback is
//! told, and the default callback drives the matching states of every other
//! member:
//!
//! | trigger  | member receives |
//! |----------|-----------------|
//! | enter    | reenter         |
//! | exit     | exit            |
//! | reenter  | reenter         |
//!
//! Team notifications only touch states that are already active in the
//! member controller; they never construct states.

mod callback;
mod manager;
mod member;

pub use callback::{DefaultTeamCallback, TeamCallback, TeamEvent};
pub use manager::{Team, TeamId, TeamManager};
pub use member::{Cooperation, Member, MemberScope};

use crate::controller::Result;

/// Receiving side of team notifications, implemented by `Controller`.
pub trait TeamMediator<P> {
    /// Suppress (or restore) this controller's own team reporting. Calls
    /// nest; reporting resumes once every suppression is released.
    fn set_team_suppressed(&self, suppressed: bool);

    /// A teammate entered a state: reenter the active subset of `states`.
    fn notify_state_enter(&self, states: u32, param: Option<&P>) -> Result<bool>;

    /// A teammate exited a state: exit the active subset of `states`.
    fn notify_state_exit(&self, states: u32, param: Option<&P>) -> Result<bool>;

    /// A teammate reentered a state: reenter the active subset of `states`.
    fn notify_state_reenter(&self, states: u32, param: Option<&P>) -> Result<bool>;
}
