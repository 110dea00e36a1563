//! Team members.

use crate::controller::{Controller, WeakController};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Which transitions a member receives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cooperation {
    /// Ignore transitions forced by a mutex partner.
    Base,
    /// Receive every transition.
    #[default]
    All,
}

/// Selects formal members, outer members, or both.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberScope(u8);

impl MemberScope {
    pub const FORMAL: MemberScope = MemberScope(1);
    pub const OUTER: MemberScope = MemberScope(1 << 1);
    pub const ALL: MemberScope = MemberScope(0b11);

    pub fn contains(self, other: MemberScope) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl BitOr for MemberScope {
    type Output = MemberScope;

    fn bitor(self, rhs: MemberScope) -> MemberScope {
        MemberScope(self.0 | rhs.0)
    }
}

impl fmt::Debug for MemberScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.contains(Self::FORMAL), self.contains(Self::OUTER)) {
            (true, true) => write!(f, "MemberScope(FORMAL | OUTER)"),
            (true, false) => write!(f, "MemberScope(FORMAL)"),
            (false, true) => write!(f, "MemberScope(OUTER)"),
            (false, false) => write!(f, "MemberScope()"),
        }
    }
}

/// A controller taking part in a team, with the states it contributes.
///
/// Holds the controller weakly; a member whose controller is gone is pruned
/// the next time its team is traversed.
pub struct Member<P> {
    controller: WeakController<P>,
    states: u32,
    cooperation: Cooperation,
}

impl<P> Clone for Member<P> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
            states: self.states,
            cooperation: self.cooperation,
        }
    }
}

impl<P> Member<P> {
    pub fn new(controller: &Controller<P>, states: u32, cooperation: Cooperation) -> Self {
        Self {
            controller: controller.downgrade(),
            states,
            cooperation,
        }
    }

    /// Member with [`Cooperation::All`].
    pub fn all(controller: &Controller<P>, states: u32) -> Self {
        Self::new(controller, states, Cooperation::All)
    }

    /// Member with [`Cooperation::Base`].
    pub fn base(controller: &Controller<P>, states: u32) -> Self {
        Self::new(controller, states, Cooperation::Base)
    }

    pub fn controller(&self) -> Option<Controller<P>> {
        self.controller.upgrade()
    }

    pub fn states(&self) -> u32 {
        self.states
    }

    pub fn cooperation(&self) -> Cooperation {
        self.cooperation
    }

    pub fn is_alive(&self) -> bool {
        self.controller.is_alive()
    }

    pub fn is_controller(&self, controller: &WeakController<P>) -> bool {
        self.controller.ptr_eq(controller)
    }

    pub(crate) fn add_states(&mut self, states: u32) {
        self.states |= states;
    }

    pub(crate) fn remove_states(&mut self, states: u32) {
        self.states &= !states;
    }
}

impl<P> fmt::Debug for Member<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("states", &self.states)
            .field("cooperation", &self.cooperation)
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_tracks_controller_liveness() {
        let controller: Controller<String> = Controller::new();
        let member = Member::all(&controller, 3);
        assert!(member.is_alive());
        assert!(member.is_controller(&controller.downgrade()));

        drop(controller);
        assert!(!member.is_alive());
        assert!(member.controller().is_none());
    }

    #[test]
    fn states_mask_is_editable() {
        let controller: Controller<String> = Controller::new();
        let mut member = Member::base(&controller, 1);
        member.add_states(4);
        member.remove_states(1);
        assert_eq!(member.states(), 4);
        assert_eq!(member.cooperation(), Cooperation::Base);
    }

    #[test]
    fn scope_contains() {
        assert!(MemberScope::ALL.contains(MemberScope::OUTER));
        assert!(!MemberScope::FORMAL.contains(MemberScope::OUTER));
        assert_eq!(
            MemberScope::FORMAL | MemberScope::OUTER,
            MemberScope::ALL
        );
    }
}
