use async_trait::async_trait;
use tracing::info;

use crate::domain::reading::IncidentReport;
use crate::flows::engine::FlowDefinition;
use crate::flows::states::{Completion, FlowContext, FlowKind, Keyboard, Reply, StepOutcome};
use crate::flows::{progress, render};
use crate::session::RootMenu;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncidentStep {
    Description,
}

impl IncidentStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Description => "incident.description",
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct IncidentFlow;

#[async_trait]
impl FlowDefinition for IncidentFlow {
    type Step = IncidentStep;

    fn kind(&self) -> FlowKind {
        FlowKind::Incident
    }

    async fn start(&self, _ctx: &FlowContext<'_>) -> StepOutcome<IncidentStep> {
        StepOutcome::next(
            IncidentStep::Description,
            Reply::text(
                "Write the incident you want to record.\n\n\
                 Send the message when you are done.\n\
                 If you don't want to continue, press 🔴 Cancel.",
            )
            .with_keyboard(Keyboard::Cancel),
        )
    }

    async fn advance(
        &self,
        step: IncidentStep,
        input: &str,
        ctx: &FlowContext<'_>,
    ) -> StepOutcome<IncidentStep> {
        let description = input.trim();
        if description.is_empty() {
            return StepOutcome::reprompt(
                step,
                Reply::text("The incident text is empty. Write something or press 🔴 Cancel.")
                    .with_keyboard(Keyboard::Cancel),
            );
        }

        let report = IncidentReport::manual(ctx.user_id.clone(), description);
        let outcome = ctx.gateway.submit_incident(&report).await;
        info!(
            event_name = "flow.incident.submitted",
            length = description.len(),
            ok = matches!(&outcome, Ok(result) if result.is_ok()),
            "incident submitted"
        );

        let completion = match &outcome {
            Ok(result) if result.is_ok() => Completion::Submitted,
            _ => Completion::SubmissionFailed,
        };
        StepOutcome::finish(
            RootMenu::Main,
            completion,
            vec![progress("Recording incident"), Reply::text(render::incident(&outcome))],
        )
    }
}
