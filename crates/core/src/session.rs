//! Per-user conversation state.
//!
//! A session is a tagged union over the active flow step. Scratch data of a
//! flow lives inside its step variant, so leaving a flow drops it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::reading::UserId;
use crate::flows::alert::AlertStep;
use crate::flows::head::HeadStep;
use crate::flows::incident::IncidentStep;
use crate::flows::pump::PumpStep;
use crate::flows::sector::SectorStep;
use crate::flows::states::FlowKind;
use crate::flows::trial::TrialStep;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RootMenu {
    Main,
    Management,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    Idle(RootMenu),
    Maintenance,
    Sector(SectorStep),
    Head(HeadStep),
    Pump(PumpStep),
    Trial(TrialStep),
    Alert(AlertStep),
    Incident(IncidentStep),
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle(RootMenu::Main)
    }
}

impl SessionState {
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Idle(_))
    }

    pub fn flow(&self) -> Option<FlowKind> {
        match self {
            Self::Idle(_) | Self::Maintenance => None,
            Self::Sector(_) => Some(FlowKind::Sector),
            Self::Head(_) => Some(FlowKind::Head),
            Self::Pump(_) => Some(FlowKind::Pump),
            Self::Trial(_) => Some(FlowKind::Trial),
            Self::Alert(_) => Some(FlowKind::AlertResolution),
            Self::Incident(_) => Some(FlowKind::Incident),
        }
    }

    pub fn step_name(&self) -> &'static str {
        match self {
            Self::Idle(RootMenu::Main) => "main_menu",
            Self::Idle(RootMenu::Management) => "management_menu",
            Self::Maintenance => "maintenance_menu",
            Self::Sector(step) => step.name(),
            Self::Head(step) => step.name(),
            Self::Pump(step) => step.name(),
            Self::Trial(step) => step.name(),
            Self::Alert(step) => step.name(),
            Self::Incident(step) => step.name(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub user_id: UserId,
    pub state: SessionState,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id, state: SessionState::default() }
    }

    /// Drops every flow field and parks the user on a root menu.
    pub fn reset_to(&mut self, root: RootMenu) {
        self.state = SessionState::Idle(root);
    }

    pub fn take_state(&mut self) -> SessionState {
        std::mem::take(&mut self.state)
    }
}

/// Sessions keyed by user, for single-task callers such as tests and the CLI.
///
/// The chat runtime does not share this map: each user's consumer task owns
/// its own [`Session`].
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: HashMap<UserId, Session>,
}

impl InMemorySessionStore {
    pub fn session_mut(&mut self, user_id: &UserId) -> &mut Session {
        self.sessions.entry(user_id.clone()).or_insert_with(|| Session::new(user_id.clone()))
    }

    pub fn get(&self, user_id: &UserId) -> Option<&Session> {
        self.sessions.get(user_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemorySessionStore, RootMenu, SessionState};
    use crate::domain::reading::UserId;
    use crate::flows::sector::SectorStep;
    use crate::flows::states::FlowKind;

    #[test]
    fn new_session_starts_on_main_menu() {
        let mut store = InMemorySessionStore::default();
        let session = store.session_mut(&UserId("42".to_owned()));
        assert_eq!(session.state, SessionState::Idle(RootMenu::Main));
        assert!(session.state.is_root());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn reset_drops_flow_fields() {
        let mut store = InMemorySessionStore::default();
        let user = UserId("42".to_owned());
        let session = store.session_mut(&user);
        session.state = SessionState::Sector(SectorStep::EndPressure {
            sector_id: 3,
            hydrant_pressure: 3.5,
        });
        assert_eq!(session.state.flow(), Some(FlowKind::Sector));
        assert_eq!(session.state.step_name(), "sector.end_pressure");

        session.reset_to(RootMenu::Management);
        assert_eq!(
            store.get(&user).map(|session| &session.state),
            Some(&SessionState::Idle(RootMenu::Management))
        );
    }
}
