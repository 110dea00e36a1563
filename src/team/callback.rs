//! Team notification protocol.

use super::manager::Team;
use super::member::{Cooperation, Member};
use super::TeamMediator;
use crate::controller::WeakController;
use crate::engine::TransitionKind;
use tracing::{debug, warn};

/// A transition of a formal member that its team is told about.
pub struct TeamEvent<'a, P> {
    /// Controller the transition happened in.
    pub trigger: &'a WeakController<P>,
    /// The single flag that transitioned.
    pub flag: u32,
    /// The transition was forced by a mutex partner.
    pub mutex: bool,
    /// The triggering state's merged parameter.
    pub param: Option<&'a P>,
}

/// Reacts to transitions of a team's formal members.
pub trait TeamCallback<P> {
    fn on_team_enter(&self, team: &Team<P>, event: &TeamEvent<'_, P>);
    fn on_team_exit(&self, team: &Team<P>, event: &TeamEvent<'_, P>);
    fn on_team_reenter(&self, team: &Team<P>, event: &TeamEvent<'_, P>);
}

/// Forwards each transition to every other live member.
///
/// Formal members are visited before outer ones. A foreign enter becomes a
/// reenter, exit stays exit, reenter stays reenter. `Base` members skip
/// mutex-forced transitions. Each member controller has its own team
/// reporting suppressed while it is driven, so nothing echoes back.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTeamCallback;

impl DefaultTeamCallback {
    fn propagate<P: Clone + 'static>(
        &self,
        team: &Team<P>,
        event: &TeamEvent<'_, P>,
        kind: TransitionKind,
    ) {
        for member in team.formal_members().iter().chain(team.outer_members()) {
            self.notify(member, event, kind);
        }
    }

    fn notify<P: Clone + 'static>(
        &self,
        member: &Member<P>,
        event: &TeamEvent<'_, P>,
        kind: TransitionKind,
    ) {
        let Some(controller) = member.controller() else {
            return;
        };
        if member.is_controller(event.trigger) {
            return;
        }
        if member.cooperation() == Cooperation::Base && event.mutex {
            debug!(flag = event.flag, "base member skips mutex transition");
            return;
        }

        controller.set_team_suppressed(true);
        let result = match kind {
            TransitionKind::Enter => controller.notify_state_enter(member.states(), event.param),
            TransitionKind::Exit => controller.notify_state_exit(member.states(), event.param),
            TransitionKind::Reenter => {
                controller.notify_state_reenter(member.states(), event.param)
            }
        };
        controller.set_team_suppressed(false);

        if let Err(error) = result {
            warn!(
                flag = event.flag,
                states = member.states(),
                error = %error,
                "team member notification failed"
            );
        }
    }
}

impl<P> TeamCallback<P> for DefaultTeamCallback
where
    P: Clone + 'static,
{
    fn on_team_enter(&self, team: &Team<P>, event: &TeamEvent<'_, P>) {
        self.propagate(team, event, TransitionKind::Enter);
    }

    fn on_team_exit(&self, team: &Team<P>, event: &TeamEvent<'_, P>) {
        self.propagate(team, event, TransitionKind::Exit);
    }

    fn on_team_reenter(&self, team: &Team<P>, event: &TeamEvent<'_, P>) {
        self.propagate(team, event, TransitionKind::Reenter);
    }
}
