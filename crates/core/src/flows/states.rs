use serde::{Deserialize, Serialize};

use crate::domain::reading::UserId;
use crate::gateway::ExternalGateway;
use crate::session::{RootMenu, SessionState};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowKind {
    Sector,
    Head,
    Pump,
    Trial,
    AlertResolution,
    Incident,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sector => "sector",
            Self::Head => "head",
            Self::Pump => "pump",
            Self::Trial => "trial",
            Self::AlertResolution => "alert_resolution",
            Self::Incident => "incident",
        }
    }

    /// Menu path the operator should follow to start this flow again.
    pub fn restart_hint(&self) -> &'static str {
        match self {
            Self::Sector => "Irrigation management → Register sector",
            Self::Head => "Irrigation management → Register head",
            Self::Pump => "Irrigation management → Register pump",
            Self::Trial => "Irrigation management → Register dripper CV",
            Self::AlertResolution => "Irrigation management → Maintenance → Open alerts",
            Self::Incident => "Irrigation management → Incidents",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keyboard {
    MainMenu,
    ManagementMenu,
    ReviewMenu,
    MaintenanceMenu,
    Cancel,
    CancelOrSkip,
    YesNo,
    Options(Vec<String>),
    /// Leave whatever keyboard the client is showing.
    Unchanged,
}

impl Keyboard {
    pub fn for_root(root: RootMenu) -> Self {
        match root {
            RootMenu::Main => Self::MainMenu,
            RootMenu::Management => Self::ManagementMenu,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub keyboard: Keyboard,
    pub markdown: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), keyboard: Keyboard::Unchanged, markdown: false }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self { text: text.into(), keyboard: Keyboard::Unchanged, markdown: true }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = keyboard;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completion {
    Submitted,
    SubmissionFailed,
    Aborted,
    NothingToDo,
}

impl Completion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::SubmissionFailed => "submission_failed",
            Self::Aborted => "aborted",
            Self::NothingToDo => "nothing_to_do",
        }
    }
}

/// What a flow handler decided for one inbound message.
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome<S> {
    Continue { step: S, replies: Vec<Reply> },
    /// Input rejected; the step is handed back untouched.
    Reprompt { step: S, replies: Vec<Reply> },
    Finish { to: RootMenu, replies: Vec<Reply>, completion: Completion },
}

impl<S> StepOutcome<S> {
    pub fn next(step: S, reply: Reply) -> Self {
        Self::Continue { step, replies: vec![reply] }
    }

    pub fn reprompt(step: S, reply: Reply) -> Self {
        Self::Reprompt { step, replies: vec![reply] }
    }

    pub fn finish(to: RootMenu, completion: Completion, replies: Vec<Reply>) -> Self {
        Self::Finish { to, replies, completion }
    }

    /// Lifts a flow-local step into another state type, usually [`SessionState`].
    pub fn map_step<T>(self, wrap: impl FnOnce(S) -> T) -> StepOutcome<T> {
        match self {
            Self::Continue { step, replies } => StepOutcome::Continue { step: wrap(step), replies },
            Self::Reprompt { step, replies } => StepOutcome::Reprompt { step: wrap(step), replies },
            Self::Finish { to, replies, completion } => {
                StepOutcome::Finish { to, replies, completion }
            }
        }
    }
}

pub struct FlowContext<'a> {
    pub gateway: &'a dyn ExternalGateway,
    pub user_id: &'a UserId,
    pub alerts_limit: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransitionOutcome {
    pub previous: &'static str,
    pub state: SessionState,
    pub replies: Vec<Reply>,
}
