use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::reading::UserId;
use crate::flows::alert::AlertResolutionFlow;
use crate::flows::head::HeadFlow;
use crate::flows::incident::IncidentFlow;
use crate::flows::menu::{self, MainChoice, MaintenanceChoice, ManagementChoice};
use crate::flows::pump::PumpFlow;
use crate::flows::sector::SectorFlow;
use crate::flows::states::{
    Completion, FlowContext, FlowKind, Keyboard, Reply, StepOutcome, TransitionOutcome,
};
use crate::flows::trial::TrialFlow;
use crate::flows::{progress, render};
use crate::gateway::ExternalGateway;
use crate::session::{InMemorySessionStore, RootMenu, Session, SessionState};
use crate::validation::is_cancel;

const AUDIT_ACTOR: &str = "conversation-engine";

/// One guided data-entry flow: how it starts and how each step reacts to input.
#[async_trait]
pub trait FlowDefinition: Send + Sync {
    type Step: Send;

    fn kind(&self) -> FlowKind;

    async fn start(&self, ctx: &FlowContext<'_>) -> StepOutcome<Self::Step>;

    async fn advance(
        &self,
        step: Self::Step,
        input: &str,
        ctx: &FlowContext<'_>,
    ) -> StepOutcome<Self::Step>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Links {
    pub panel: String,
    pub progress: String,
    pub docs: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    pub alerts_limit: usize,
    pub links: Links,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { alerts_limit: 20, links: Links::default() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Start,
    Help,
    Cancel,
}

/// Root dispatcher over the menus and every flow state machine.
pub struct ConversationEngine<G> {
    gateway: G,
    settings: EngineSettings,
    audit: Option<Arc<dyn AuditSink>>,
}

impl<G> ConversationEngine<G>
where
    G: ExternalGateway,
{
    pub fn new(gateway: G, settings: EngineSettings) -> Self {
        Self { gateway, settings, audit: None }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Convenience entry point over a shared store; assigns a fresh correlation id.
    pub async fn transition(
        &self,
        store: &mut InMemorySessionStore,
        user_id: &UserId,
        text: &str,
    ) -> TransitionOutcome {
        let correlation_id = Uuid::new_v4().to_string();
        let session = store.session_mut(user_id);
        self.handle(session, text, &correlation_id).await
    }

    /// Applies one inbound message to a session. Never fails: every error is
    /// rendered into the replies and reflected in the resulting state.
    pub async fn handle(
        &self,
        session: &mut Session,
        text: &str,
        correlation_id: &str,
    ) -> TransitionOutcome {
        let previous = session.state.step_name();
        let replies = self.dispatch(session, text, correlation_id).await;

        info!(
            event_name = "flow.transition",
            correlation_id = %correlation_id,
            user_id = %session.user_id,
            from = previous,
            to = session.state.step_name(),
            replies = replies.len(),
            "message handled"
        );

        TransitionOutcome { previous, state: session.state.clone(), replies }
    }

    async fn dispatch(
        &self,
        session: &mut Session,
        text: &str,
        correlation_id: &str,
    ) -> Vec<Reply> {
        if let Some(command) = parse_command(text) {
            return self.run_command(session, command, correlation_id);
        }

        if !session.state.is_root() && is_cancel(text) {
            return self.cancel(session, correlation_id);
        }

        let user_id = session.user_id.clone();
        let ctx = FlowContext {
            gateway: &self.gateway,
            user_id: &user_id,
            alerts_limit: self.settings.alerts_limit,
        };

        match session.take_state() {
            SessionState::Idle(RootMenu::Main) => self.main_menu(session, text),
            SessionState::Idle(RootMenu::Management) => {
                self.management_menu(session, text, &ctx, correlation_id).await
            }
            SessionState::Maintenance => match menu::parse_maintenance(text) {
                Some(MaintenanceChoice::OpenAlerts) => {
                    let outcome =
                        AlertResolutionFlow.start(&ctx).await.map_step(SessionState::Alert);
                    self.started(session, FlowKind::AlertResolution, outcome, correlation_id)
                }
                None => {
                    session.state = SessionState::Maintenance;
                    vec![Reply::text(menu::NOT_UNDERSTOOD_MAINTENANCE)
                        .with_keyboard(Keyboard::MaintenanceMenu)]
                }
            },
            SessionState::Sector(step) => {
                let outcome =
                    SectorFlow.advance(step, text, &ctx).await.map_step(SessionState::Sector);
                self.apply(session, FlowKind::Sector, outcome, correlation_id)
            }
            SessionState::Head(step) => {
                let outcome = HeadFlow.advance(step, text, &ctx).await.map_step(SessionState::Head);
                self.apply(session, FlowKind::Head, outcome, correlation_id)
            }
            SessionState::Pump(step) => {
                let outcome = PumpFlow.advance(step, text, &ctx).await.map_step(SessionState::Pump);
                self.apply(session, FlowKind::Pump, outcome, correlation_id)
            }
            SessionState::Trial(step) => {
                let outcome =
                    TrialFlow.advance(step, text, &ctx).await.map_step(SessionState::Trial);
                self.apply(session, FlowKind::Trial, outcome, correlation_id)
            }
            SessionState::Alert(step) => {
                let outcome = AlertResolutionFlow
                    .advance(step, text, &ctx)
                    .await
                    .map_step(SessionState::Alert);
                self.apply(session, FlowKind::AlertResolution, outcome, correlation_id)
            }
            SessionState::Incident(step) => {
                let outcome =
                    IncidentFlow.advance(step, text, &ctx).await.map_step(SessionState::Incident);
                self.apply(session, FlowKind::Incident, outcome, correlation_id)
            }
        }
    }

    fn run_command(
        &self,
        session: &mut Session,
        command: Command,
        correlation_id: &str,
    ) -> Vec<Reply> {
        if command == Command::Cancel {
            return self.cancel(session, correlation_id);
        }

        if let Some(flow) = session.state.flow() {
            self.emit(
                session,
                correlation_id,
                "flow.cancelled",
                AuditOutcome::Rejected,
                AuditCategory::Flow,
                flow,
                "command",
            );
        }
        session.reset_to(RootMenu::Main);

        let text = match command {
            Command::Start => menu::GREETING,
            Command::Help | Command::Cancel => menu::HELP_TEXT,
        };
        vec![Reply::markdown(text).with_keyboard(Keyboard::MainMenu)]
    }

    fn cancel(&self, session: &mut Session, correlation_id: &str) -> Vec<Reply> {
        if let Some(flow) = session.state.flow() {
            self.emit(
                session,
                correlation_id,
                "flow.cancelled",
                AuditOutcome::Rejected,
                AuditCategory::Flow,
                flow,
                "cancel_keyword",
            );
        }
        session.reset_to(RootMenu::Main);
        vec![Reply::text(menu::CANCELLED).with_keyboard(Keyboard::MainMenu)]
    }

    fn main_menu(&self, session: &mut Session, text: &str) -> Vec<Reply> {
        let links = &self.settings.links;
        match menu::parse_main(text) {
            Some(MainChoice::Management) => {
                session.reset_to(RootMenu::Management);
                vec![Reply::markdown(menu::GREETING).with_keyboard(Keyboard::ManagementMenu)]
            }
            Some(MainChoice::Improvement) => {
                session.reset_to(RootMenu::Main);
                vec![Reply::markdown(menu::improvement_text(&links.progress))
                    .with_keyboard(Keyboard::MainMenu)]
            }
            Some(MainChoice::Documentation) => {
                session.reset_to(RootMenu::Main);
                vec![Reply::markdown(menu::documentation_text(&links.docs))
                    .with_keyboard(Keyboard::MainMenu)]
            }
            Some(MainChoice::Help) => {
                session.reset_to(RootMenu::Main);
                vec![Reply::markdown(menu::HELP_TEXT).with_keyboard(Keyboard::MainMenu)]
            }
            None => {
                session.reset_to(RootMenu::Main);
                vec![Reply::text(menu::NOT_UNDERSTOOD_MAIN).with_keyboard(Keyboard::MainMenu)]
            }
        }
    }

    async fn management_menu(
        &self,
        session: &mut Session,
        text: &str,
        ctx: &FlowContext<'_>,
        correlation_id: &str,
    ) -> Vec<Reply> {
        let Some(choice) = menu::parse_management(text) else {
            session.reset_to(RootMenu::Management);
            return vec![Reply::text(menu::NOT_UNDERSTOOD_MANAGEMENT)
                .with_keyboard(Keyboard::ManagementMenu)];
        };

        match choice {
            ManagementChoice::ControlPanel => {
                session.reset_to(RootMenu::Management);
                self.control_panel().await
            }
            ManagementChoice::Review => {
                session.reset_to(RootMenu::Management);
                vec![Reply::markdown(menu::REVIEW_INTRO).with_keyboard(Keyboard::ReviewMenu)]
            }
            ManagementChoice::RegisterSector => {
                let outcome = SectorFlow.start(ctx).await.map_step(SessionState::Sector);
                self.started(session, FlowKind::Sector, outcome, correlation_id)
            }
            ManagementChoice::RegisterHead => {
                let outcome = HeadFlow.start(ctx).await.map_step(SessionState::Head);
                self.started(session, FlowKind::Head, outcome, correlation_id)
            }
            ManagementChoice::RegisterPump => {
                let outcome = PumpFlow.start(ctx).await.map_step(SessionState::Pump);
                self.started(session, FlowKind::Pump, outcome, correlation_id)
            }
            ManagementChoice::RegisterDripperCv => {
                let outcome = TrialFlow.start(ctx).await.map_step(SessionState::Trial);
                self.started(session, FlowKind::Trial, outcome, correlation_id)
            }
            ManagementChoice::Maintenance => {
                session.state = SessionState::Maintenance;
                vec![Reply::markdown(menu::MAINTENANCE_INTRO)
                    .with_keyboard(Keyboard::MaintenanceMenu)]
            }
            ManagementChoice::Incidents => {
                let outcome = IncidentFlow.start(ctx).await.map_step(SessionState::Incident);
                self.started(session, FlowKind::Incident, outcome, correlation_id)
            }
            ManagementChoice::Cancel => self.cancel(session, correlation_id),
        }
    }

    async fn control_panel(&self) -> Vec<Reply> {
        let summary = match self.gateway.fetch_farm_summary().await {
            Ok(summary) => render::farm_summary(&summary),
            Err(error) => {
                info!(
                    event_name = "flow.control_panel.summary_unavailable",
                    error = %error,
                    "farm summary unavailable"
                );
                menu::SUMMARY_UNAVAILABLE.to_owned()
            }
        };

        vec![
            progress("Checking the farm status"),
            Reply::markdown(menu::control_panel_text(&summary, &self.settings.links.panel))
                .with_keyboard(Keyboard::ManagementMenu),
        ]
    }

    fn started(
        &self,
        session: &mut Session,
        flow: FlowKind,
        outcome: StepOutcome<SessionState>,
        correlation_id: &str,
    ) -> Vec<Reply> {
        if matches!(outcome, StepOutcome::Continue { .. }) {
            self.emit(
                session,
                correlation_id,
                "flow.started",
                AuditOutcome::Success,
                AuditCategory::Flow,
                flow,
                "started",
            );
        }
        self.apply(session, flow, outcome, correlation_id)
    }

    fn apply(
        &self,
        session: &mut Session,
        flow: FlowKind,
        outcome: StepOutcome<SessionState>,
        correlation_id: &str,
    ) -> Vec<Reply> {
        match outcome {
            StepOutcome::Continue { step, replies } => {
                session.state = step;
                replies
            }
            StepOutcome::Reprompt { step, replies } => {
                debug!(
                    event_name = "flow.reprompt",
                    correlation_id = %correlation_id,
                    flow = flow.as_str(),
                    step = step.step_name(),
                    "input rejected"
                );
                session.state = step;
                replies
            }
            StepOutcome::Finish { to, mut replies, completion } => {
                let (event_type, outcome) = match completion {
                    Completion::Submitted => ("flow.submitted", AuditOutcome::Success),
                    Completion::SubmissionFailed => ("flow.submitted", AuditOutcome::Failed),
                    Completion::Aborted => ("flow.aborted", AuditOutcome::Failed),
                    Completion::NothingToDo => ("flow.aborted", AuditOutcome::Rejected),
                };
                // The record-keeping service refused or never answered the write.
                let category = match completion {
                    Completion::SubmissionFailed => AuditCategory::Gateway,
                    _ => AuditCategory::Flow,
                };
                self.emit(
                    session,
                    correlation_id,
                    event_type,
                    outcome,
                    category,
                    flow,
                    completion.as_str(),
                );

                session.reset_to(to);
                if let Some(last) = replies.last_mut() {
                    last.keyboard = Keyboard::for_root(to);
                }
                replies
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        session: &Session,
        correlation_id: &str,
        event_type: &str,
        outcome: AuditOutcome,
        category: AuditCategory,
        flow: FlowKind,
        detail: &str,
    ) {
        let Some(sink) = &self.audit else {
            return;
        };
        sink.emit(
            AuditEvent::new(
                session.user_id.clone(),
                correlation_id,
                event_type,
                category,
                AUDIT_ACTOR,
                outcome,
            )
            .with_metadata("flow", flow.as_str())
            .with_metadata("detail", detail),
        );
    }
}

fn parse_command(text: &str) -> Option<Command> {
    let token = text.split_whitespace().next()?;
    let name = token.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name).to_lowercase();
    match name.as_str() {
        "start" => Some(Command::Start),
        "help" | "ayuda" => Some(Command::Help),
        "cancel" => Some(Command::Cancel),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{parse_command, Command, ConversationEngine, EngineSettings, Links};
    use crate::audit::InMemoryAuditSink;
    use crate::domain::catalog::{CatalogEntry, CatalogKind};
    use crate::domain::reading::{FarmSummary, TrafficLight, UserId};
    use crate::flows::sector::SectorStep;
    use crate::flows::states::Keyboard;
    use crate::gateway::{GatewayError, ScriptedGateway};
    use crate::session::{InMemorySessionStore, RootMenu, SessionState};

    fn settings() -> EngineSettings {
        EngineSettings {
            alerts_limit: 20,
            links: Links {
                panel: "https://riego.example/panel".to_owned(),
                progress: "https://riego.example/progress".to_owned(),
                docs: "https://riego.example/docs".to_owned(),
            },
        }
    }

    #[test]
    fn commands_accept_bot_suffix_and_alias() {
        assert_eq!(parse_command("/start"), Some(Command::Start));
        assert_eq!(parse_command("/start@riego_bot"), Some(Command::Start));
        assert_eq!(parse_command(" /AYUDA "), Some(Command::Help));
        assert_eq!(parse_command("/cancel now"), Some(Command::Cancel));
        assert_eq!(parse_command("/unknown"), None);
        assert_eq!(parse_command("start"), None);
    }

    #[tokio::test]
    async fn main_menu_links_keep_the_user_on_main_menu() {
        let engine = ConversationEngine::new(ScriptedGateway::default(), settings());
        let mut store = InMemorySessionStore::default();
        let user = UserId("1".to_owned());

        let outcome = engine.transition(&mut store, &user, "Documentation").await;
        assert_eq!(outcome.state, SessionState::Idle(RootMenu::Main));
        assert!(outcome.replies[0].text.contains("https://riego.example/docs"));
    }

    #[tokio::test]
    async fn control_panel_renders_summary_or_soft_notice() {
        let summary = FarmSummary {
            sectors: TrafficLight { green: 3, yellow: 0, red: 1 },
            ..FarmSummary::default()
        };
        let engine = ConversationEngine::new(
            ScriptedGateway::default().with_farm_summary(Ok(summary)),
            settings(),
        );
        let mut store = InMemorySessionStore::default();
        let user = UserId("1".to_owned());
        engine.transition(&mut store, &user, "Irrigation management").await;

        let outcome = engine.transition(&mut store, &user, "Control panel").await;
        assert_eq!(outcome.state, SessionState::Idle(RootMenu::Management));
        assert!(outcome.replies[1].text.contains("🟢 3 · 🟡 0 · 🔴 1"));
        assert!(outcome.replies[1].text.contains("https://riego.example/panel"));

        let failing = ConversationEngine::new(
            ScriptedGateway::default()
                .with_farm_summary(Err(GatewayError::Transport("down".to_owned()))),
            settings(),
        );
        let outcome = failing.transition(&mut store, &user, "Control panel").await;
        assert!(outcome.replies[1].text.contains("couldn't reach the panel"));
        assert_eq!(outcome.replies[1].keyboard, Keyboard::ManagementMenu);
    }

    #[tokio::test]
    async fn start_command_clears_an_active_flow() {
        let sink = Arc::new(InMemoryAuditSink::default());
        let engine = ConversationEngine::new(ScriptedGateway::default(), settings())
            .with_audit_sink(sink.clone());
        let mut store = InMemorySessionStore::default();
        let user = UserId("1".to_owned());
        store.session_mut(&user).state =
            SessionState::Sector(SectorStep::HydrantPressure { sector_id: 4 });

        let outcome = engine.transition(&mut store, &user, "/start").await;
        assert_eq!(outcome.state, SessionState::Idle(RootMenu::Main));
        assert_eq!(outcome.previous, "sector.hydrant_pressure");
        assert_eq!(sink.events()[0].event_type, "flow.cancelled");
    }

    #[tokio::test]
    async fn flow_start_and_catalog_failure_are_audited() {
        let sink = Arc::new(InMemoryAuditSink::default());
        let gateway = ScriptedGateway::default()
            .with_catalog(
                CatalogKind::Sector,
                vec![CatalogEntry::new(1, Some("S1"), Some("Norte"))],
            )
            .with_catalog_error(CatalogKind::Head, GatewayError::Timeout { secs: 10 });
        let engine = ConversationEngine::new(gateway, settings()).with_audit_sink(sink.clone());
        let mut store = InMemorySessionStore::default();
        let user = UserId("1".to_owned());
        engine.transition(&mut store, &user, "Irrigation management").await;

        let started = engine.transition(&mut store, &user, "Register sector").await;
        assert!(matches!(started.state, SessionState::Sector(SectorStep::SelectSector { .. })));

        engine.transition(&mut store, &user, "cancel").await;
        engine.transition(&mut store, &user, "Irrigation management").await;
        let failed = engine.transition(&mut store, &user, "Register head").await;
        assert_eq!(failed.state, SessionState::Idle(RootMenu::Management));
        assert_eq!(
            failed.replies.last().map(|reply| &reply.keyboard),
            Some(&Keyboard::ManagementMenu)
        );

        let kinds: Vec<String> = sink.events().into_iter().map(|event| event.event_type).collect();
        assert_eq!(kinds, vec!["flow.started", "flow.cancelled", "flow.aborted"]);
    }
}
