use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::alert::OpenAlert;
use crate::domain::catalog::LabelLookup;
use crate::domain::reading::MaintenanceRecord;
use crate::flows::engine::FlowDefinition;
use crate::flows::states::{Completion, FlowContext, FlowKind, Keyboard, Reply, StepOutcome};
use crate::flows::{progress, render, select};
use crate::session::RootMenu;
use crate::validation::is_skip;

#[derive(Clone, Debug, PartialEq)]
pub enum AlertStep {
    SelectAlert { alerts: LabelLookup<OpenAlert> },
    Comment { alert: OpenAlert },
}

impl AlertStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectAlert { .. } => "alert.select",
            Self::Comment { .. } => "alert.comment",
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AlertResolutionFlow;

#[async_trait]
impl FlowDefinition for AlertResolutionFlow {
    type Step = AlertStep;

    fn kind(&self) -> FlowKind {
        FlowKind::AlertResolution
    }

    async fn start(&self, ctx: &FlowContext<'_>) -> StepOutcome<AlertStep> {
        let searching = progress("Looking up open alerts");
        let alerts = match ctx.gateway.fetch_open_alerts(ctx.alerts_limit).await {
            Ok(alerts) => alerts,
            Err(error) => {
                warn!(
                    event_name = "flow.alert.fetch_failed",
                    error = %error,
                    "open alerts unavailable"
                );
                return StepOutcome::finish(
                    RootMenu::Management,
                    Completion::Aborted,
                    vec![
                        searching,
                        Reply::text(format!("❌ Error connecting to the alert system: {error}")),
                    ],
                );
            }
        };

        if alerts.is_empty() {
            return StepOutcome::finish(
                RootMenu::Management,
                Completion::NothingToDo,
                vec![searching, Reply::text("✅ No open alerts right now. Good sign. 😄")],
            );
        }

        let listing = alerts
            .iter()
            .map(|alert| {
                format!(
                    "{}\nReason: {}",
                    render::escape_markdown(&alert.label()),
                    render::escape_markdown(&alert.reason)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let lookup = LabelLookup::from_pairs(
            alerts.into_iter().map(|alert| (alert.label(), alert.id, alert)),
        );

        let reply = Reply::markdown(format!(
            "These are the *open alerts*:\n\n{listing}\n\n\
             Pick one from the list to record what you did."
        ))
        .with_keyboard(Keyboard::Options(lookup.labels()));
        StepOutcome::Continue {
            step: AlertStep::SelectAlert { alerts: lookup },
            replies: vec![searching, reply],
        }
    }

    async fn advance(
        &self,
        step: AlertStep,
        input: &str,
        ctx: &FlowContext<'_>,
    ) -> StepOutcome<AlertStep> {
        match step {
            AlertStep::SelectAlert { alerts } => {
                let alert = match select(alerts, input, self.kind(), "alert", |alerts| {
                    AlertStep::SelectAlert { alerts }
                }) {
                    Ok(alert) => alert,
                    Err(outcome) => return outcome,
                };

                let reply = Reply::markdown(format!(
                    "You are handling alert {}.\n\n*Reason:*\n{}\n\n\
                     Briefly describe what you did about it.\nFor example: \"Flushed filters and purged the line\".\n\n\
                     If you ended up doing nothing, write *No action* or press *Skip* to leave no comment.",
                    render::escape_markdown(&alert.label()),
                    render::escape_markdown(&alert.reason)
                ))
                .with_keyboard(Keyboard::CancelOrSkip);
                StepOutcome::next(AlertStep::Comment { alert }, reply)
            }
            AlertStep::Comment { alert } => {
                let trimmed = input.trim();
                let comment = if trimmed.is_empty() || is_skip(trimmed) {
                    None
                } else {
                    Some(trimmed.to_owned())
                };

                let record =
                    MaintenanceRecord::alert_resolution(ctx.user_id.clone(), &alert, comment);
                let outcome = ctx.gateway.submit_maintenance(&record).await;
                info!(
                    event_name = "flow.alert.resolved",
                    alert_id = alert.id,
                    ok = matches!(&outcome, Ok(result) if result.is_ok()),
                    "alert resolution submitted"
                );

                let completion = match &outcome {
                    Ok(result) if result.is_ok() => Completion::Submitted,
                    _ => Completion::SubmissionFailed,
                };
                StepOutcome::finish(
                    RootMenu::Main,
                    completion,
                    vec![
                        progress("Recording the alert resolution"),
                        Reply::markdown(render::maintenance(&outcome)),
                    ],
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AlertResolutionFlow, AlertStep};
    use crate::domain::alert::{AlertTarget, OpenAlert};
    use crate::domain::reading::{MaintenanceKind, UserId, ALERT_RESOLUTION_TASK};
    use crate::flows::engine::FlowDefinition;
    use crate::flows::states::{Completion, FlowContext, Keyboard, StepOutcome};
    use crate::gateway::{RecordedCall, ScriptedGateway};
    use crate::session::RootMenu;

    fn head_alert() -> OpenAlert {
        OpenAlert {
            id: 12,
            target_kind: AlertTarget::Head,
            target_id: Some(2),
            level: "amarillo".to_owned(),
            reason: "Filtro sucio".to_owned(),
        }
    }

    #[tokio::test]
    async fn no_open_alerts_stays_on_management_menu() {
        let gateway = ScriptedGateway::default();
        let user = UserId("8".to_owned());
        let ctx = FlowContext { gateway: &gateway, user_id: &user, alerts_limit: 20 };

        match AlertResolutionFlow.start(&ctx).await {
            StepOutcome::Finish { to, completion, replies } => {
                assert_eq!(to, RootMenu::Management);
                assert_eq!(completion, Completion::NothingToDo);
                assert!(replies[1].text.contains("No open alerts"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(gateway.calls(), vec![RecordedCall::FetchOpenAlerts(20)]);
    }

    #[tokio::test]
    async fn listed_label_selects_the_alert() {
        let gateway = ScriptedGateway::default().with_open_alerts(Ok(vec![head_alert()]));
        let user = UserId("8".to_owned());
        let ctx = FlowContext { gateway: &gateway, user_id: &user, alerts_limit: 20 };

        let step = match AlertResolutionFlow.start(&ctx).await {
            StepOutcome::Continue { step, replies } => {
                assert!(replies[1].text.contains("Reason: Filtro sucio"));
                step
            }
            other => panic!("unexpected outcome {other:?}"),
        };

        let outcome = AlertResolutionFlow.advance(step, "[#12] Head 2 · AMARILLO", &ctx).await;
        assert!(matches!(
            outcome,
            StepOutcome::Continue { step: AlertStep::Comment { ref alert }, .. } if alert.id == 12
        ));
    }

    #[tokio::test]
    async fn listing_escapes_service_text() {
        let alert = OpenAlert { reason: "p_final bajo en *linea 3*".to_owned(), ..head_alert() };
        let gateway = ScriptedGateway::default().with_open_alerts(Ok(vec![alert]));
        let user = UserId("8".to_owned());
        let ctx = FlowContext { gateway: &gateway, user_id: &user, alerts_limit: 20 };

        match AlertResolutionFlow.start(&ctx).await {
            StepOutcome::Continue { replies, .. } => {
                assert!(replies[1].markdown);
                assert!(replies[1].text.contains("\\[#12] Head 2"));
                assert!(replies[1].text.contains("Reason: p\\_final bajo en \\*linea 3\\*"));
                assert_eq!(
                    replies[1].keyboard,
                    Keyboard::Options(vec!["[#12] Head 2 · AMARILLO".to_owned()])
                );
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn skipped_comment_submits_corrective_maintenance_on_the_head() {
        let gateway = ScriptedGateway::default();
        let user = UserId("8".to_owned());
        let ctx = FlowContext { gateway: &gateway, user_id: &user, alerts_limit: 20 };

        let outcome = AlertResolutionFlow
            .advance(AlertStep::Comment { alert: head_alert() }, "Skip", &ctx)
            .await;
        assert!(matches!(outcome, StepOutcome::Finish { completion: Completion::Submitted, .. }));

        match gateway.submissions().as_slice() {
            [RecordedCall::Maintenance(record)] => {
                assert_eq!(record.task_code, ALERT_RESOLUTION_TASK);
                assert_eq!(record.kind, MaintenanceKind::Corrective);
                assert_eq!(record.description, None);
                assert_eq!(record.head_id, Some(2));
                assert_eq!(record.sector_id, None);
                assert_eq!(record.alert_id, Some(12));
            }
            other => panic!("unexpected submissions {other:?}"),
        }
    }
}
