//! Team registry.

use super::callback::{DefaultTeamCallback, TeamCallback, TeamEvent};
use super::member::{Member, MemberScope};
use crate::controller::{Controller, ControllerError, Result, WeakController};
use crate::engine::{TransitionKind, TransitionReport};
use crate::message::{Message, MessagePolicy, MessageScope};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

/// Identifier handed out by [`TeamManager::register`]. Starts at 1.
pub type TeamId = u32;

/// Formal and outer members plus the callback that reacts to the formal
/// members' transitions.
///
/// Formal members both trigger and receive notifications; outer members only
/// receive them.
pub struct Team<P> {
    formal: Vec<Member<P>>,
    outer: Vec<Member<P>>,
    callback: Rc<dyn TeamCallback<P>>,
}

impl<P> Clone for Team<P> {
    fn clone(&self) -> Self {
        Self {
            formal: self.formal.clone(),
            outer: self.outer.clone(),
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<P: Clone + 'static> Team<P> {
    /// Team using [`DefaultTeamCallback`].
    pub fn new(formal: Vec<Member<P>>, outer: Vec<Member<P>>) -> Self {
        Self::with_callback(formal, outer, DefaultTeamCallback)
    }
}

impl<P> Team<P> {
    pub fn with_callback<C>(formal: Vec<Member<P>>, outer: Vec<Member<P>>, callback: C) -> Self
    where
        C: TeamCallback<P> + 'static,
    {
        Self {
            formal,
            outer,
            callback: Rc::new(callback),
        }
    }

    pub fn formal_members(&self) -> &[Member<P>] {
        &self.formal
    }

    pub fn outer_members(&self) -> &[Member<P>] {
        &self.outer
    }

    /// Members selected by `scope`, formal first.
    pub fn members(&self, scope: MemberScope) -> impl Iterator<Item = &Member<P>> {
        let formal: &[Member<P>] = if scope.contains(MemberScope::FORMAL) {
            self.formal.as_slice()
        } else {
            &[]
        };
        let outer: &[Member<P>] = if scope.contains(MemberScope::OUTER) {
            self.outer.as_slice()
        } else {
            &[]
        };
        formal.iter().chain(outer.iter())
    }

    fn lists_mut(&mut self, scope: MemberScope) -> Vec<&mut Vec<Member<P>>> {
        let mut lists = Vec::with_capacity(2);
        if scope.contains(MemberScope::FORMAL) {
            lists.push(&mut self.formal);
        }
        if scope.contains(MemberScope::OUTER) {
            lists.push(&mut self.outer);
        }
        lists
    }

    /// A formal member of `controller` covers `flag`.
    fn is_triggered_by(&self, controller: &WeakController<P>, flag: u32) -> bool {
        self.formal
            .iter()
            .any(|m| m.is_controller(controller) && m.states() & flag != 0)
    }

    fn contains(&self, controller: &WeakController<P>, scope: MemberScope) -> bool {
        self.members(scope).any(|m| m.is_controller(controller))
    }

    /// Drop members whose controller is gone. Returns how many were dropped.
    fn prune(&mut self) -> usize {
        let before = self.formal.len() + self.outer.len();
        self.formal.retain(Member::is_alive);
        self.outer.retain(Member::is_alive);
        before - self.formal.len() - self.outer.len()
    }
}

struct Teams<P> {
    teams: BTreeMap<TeamId, Team<P>>,
    next_id: TeamId,
}

/// Registry of teams, shared by every controller that takes part in one.
///
/// `TeamManager` is a cheap clonable handle. Attach it to each controller with
/// `Controller::set_team_manager`; transitions of formal members are then
/// forwarded to their teams.
///
/// # Example
///
/// ```rust
/// use flagstate::controller::Controller;
/// use flagstate::team::{Member, MemberScope, TeamManager};
///
/// let manager: TeamManager<String> = TeamManager::new();
/// let left = Controller::new();
/// let right = Controller::new();
///
/// let id = manager
///     .register_team(vec![Member::all(&left, 1), Member::all(&right, 1)], vec![])
///     .unwrap();
/// assert_eq!(id, 1);
/// assert!(manager.is_formal_member(id, &right));
/// assert_eq!(manager.teams_of(&left, MemberScope::ALL), vec![id]);
/// ```
pub struct TeamManager<P> {
    inner: Rc<RefCell<Teams<P>>>,
}

impl<P> Clone for TeamManager<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P> Default for TeamManager<P> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Teams {
                teams: BTreeMap::new(),
                next_id: 1,
            })),
        }
    }
}

impl<P: Clone + 'static> TeamManager<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a team using [`DefaultTeamCallback`].
    pub fn register_team(&self, formal: Vec<Member<P>>, outer: Vec<Member<P>>) -> Result<TeamId> {
        self.register(Team::new(formal, outer))
    }

    /// Register a team with a custom callback.
    pub fn register_team_with<C>(
        &self,
        formal: Vec<Member<P>>,
        outer: Vec<Member<P>>,
        callback: C,
    ) -> Result<TeamId>
    where
        C: TeamCallback<P> + 'static,
    {
        self.register(Team::with_callback(formal, outer, callback))
    }

    /// Register a team. A team needs at least one formal member.
    pub fn register(&self, team: Team<P>) -> Result<TeamId> {
        if team.formal.is_empty() {
            return Err(ControllerError::EmptyKeys);
        }
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.teams.insert(id, team);
        debug!(team = id, "team registered");
        Ok(id)
    }

    pub fn unregister_team(&self, id: TeamId) -> bool {
        self.inner.borrow_mut().teams.remove(&id).is_some()
    }

    pub fn team(&self, id: TeamId) -> Option<Team<P>> {
        self.inner.borrow().teams.get(&id).cloned()
    }

    pub fn team_count(&self) -> usize {
        self.inner.borrow().teams.len()
    }

    pub fn clear_teams(&self) {
        self.inner.borrow_mut().teams.clear();
    }

    pub fn add_formal_member(&self, id: TeamId, member: Member<P>) -> bool {
        self.edit_team(id, |team| team.formal.push(member)).is_some()
    }

    pub fn add_outer_member(&self, id: TeamId, member: Member<P>) -> bool {
        self.edit_team(id, |team| team.outer.push(member)).is_some()
    }

    /// Extend the mask of `controller`'s member in the selected lists.
    pub fn add_member_states(
        &self,
        id: TeamId,
        controller: &Controller<P>,
        states: u32,
        scope: MemberScope,
    ) -> bool {
        let target = controller.downgrade();
        self.edit_team(id, |team| {
            let mut found = false;
            for list in team.lists_mut(scope) {
                for member in list.iter_mut().filter(|m| m.is_controller(&target)) {
                    member.add_states(states);
                    found = true;
                }
            }
            found
        })
        .unwrap_or(false)
    }

    pub fn delete_member(
        &self,
        id: TeamId,
        controller: &Controller<P>,
        scope: MemberScope,
    ) -> bool {
        let target = controller.downgrade();
        self.edit_team(id, |team| {
            let mut removed = false;
            for list in team.lists_mut(scope) {
                let before = list.len();
                list.retain(|m| !m.is_controller(&target));
                removed |= list.len() != before;
            }
            removed
        })
        .unwrap_or(false)
    }

    /// Narrow the mask of `controller`'s member; a member left with no states
    /// is removed.
    pub fn delete_member_states(
        &self,
        id: TeamId,
        controller: &Controller<P>,
        states: u32,
        scope: MemberScope,
    ) -> bool {
        let target = controller.downgrade();
        self.edit_team(id, |team| {
            let mut found = false;
            for list in team.lists_mut(scope) {
                for member in list.iter_mut().filter(|m| m.is_controller(&target)) {
                    member.remove_states(states);
                    found = true;
                }
                list.retain(|m| m.states() != 0);
            }
            found
        })
        .unwrap_or(false)
    }

    /// Ids of every team `controller` belongs to in the selected lists.
    pub fn teams_of(&self, controller: &Controller<P>, scope: MemberScope) -> Vec<TeamId> {
        let target = controller.downgrade();
        self.inner
            .borrow()
            .teams
            .iter()
            .filter(|(_, team)| team.contains(&target, scope))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn is_formal_member(&self, id: TeamId, controller: &Controller<P>) -> bool {
        self.is_member(id, controller, MemberScope::FORMAL)
    }

    pub fn is_outer_member(&self, id: TeamId, controller: &Controller<P>) -> bool {
        self.is_member(id, controller, MemberScope::OUTER)
    }

    fn is_member(&self, id: TeamId, controller: &Controller<P>, scope: MemberScope) -> bool {
        let target = controller.downgrade();
        self.inner
            .borrow()
            .teams
            .get(&id)
            .map_or(false, |team| team.contains(&target, scope))
    }

    fn edit_team<R>(&self, id: TeamId, edit: impl FnOnce(&mut Team<P>) -> R) -> Option<R> {
        self.inner.borrow_mut().teams.get_mut(&id).map(edit)
    }

    /// Update each live member's active states inside its mask.
    pub fn update(&self, delta: Duration, param: Option<&P>) {
        let targets: Vec<(Controller<P>, u32)> = {
            let inner = self.inner.borrow();
            inner
                .teams
                .values()
                .flat_map(|team| team.members(MemberScope::ALL))
                .filter_map(|m| m.controller().map(|c| (c, m.states())))
                .collect()
        };
        for (controller, states) in targets {
            if let Err(error) = controller.update_active_states(states, delta, param) {
                warn!(states = states, error = %error, "team member update failed");
            }
        }
    }

    /// Dispatch a message built by `make` to each live member selected by
    /// `members`, restricted to that member's states.
    ///
    /// With [`MessagePolicy::Consume`] delivery stops at the first member
    /// that handles it.
    pub fn send_message<F>(
        &self,
        id: TeamId,
        make: F,
        policy: MessagePolicy,
        scope: MessageScope,
        members: MemberScope,
    ) -> bool
    where
        F: Fn() -> Message,
    {
        let targets: Vec<(Controller<P>, u32)> = match self.team(id) {
            Some(team) => team
                .members(members)
                .filter_map(|m| m.controller().map(|c| (c, m.states())))
                .collect(),
            None => return false,
        };

        let mut handled = false;
        for (controller, states) in targets {
            match controller.dispatch_message_to(states, make(), policy, scope) {
                Ok(true) => {
                    handled = true;
                    if policy == MessagePolicy::Consume {
                        break;
                    }
                }
                Ok(false) => {}
                Err(error) => warn!(team = id, error = %error, "team message dispatch failed"),
            }
        }
        handled
    }

    /// Forward one transition of `trigger` to every team it triggers.
    pub(crate) fn dispatch(&self, trigger: &WeakController<P>, report: &TransitionReport<P>) {
        let teams: Vec<Team<P>> = self
            .inner
            .borrow()
            .teams
            .values()
            .filter(|team| team.is_triggered_by(trigger, report.flag))
            .cloned()
            .collect();
        if teams.is_empty() {
            return;
        }

        let event = TeamEvent {
            trigger,
            flag: report.flag,
            mutex: report.mutex,
            param: report.param.as_ref(),
        };
        for team in &teams {
            match report.kind {
                TransitionKind::Enter => team.callback.on_team_enter(team, &event),
                TransitionKind::Exit => team.callback.on_team_exit(team, &event),
                TransitionKind::Reenter => team.callback.on_team_reenter(team, &event),
            }
        }
        self.prune();
    }

    fn prune(&self) {
        let mut inner = self.inner.borrow_mut();
        for (id, team) in inner.teams.iter_mut() {
            let pruned = team.prune();
            if pruned > 0 {
                debug!(team = *id, pruned = pruned, "pruned dead team members");
            }
        }
    }
}
