use async_trait::async_trait;
use tracing::info;

use crate::domain::catalog::{CatalogKind, LabelLookup};
use crate::domain::reading::SectorReading;
use crate::flows::engine::FlowDefinition;
use crate::flows::states::{Completion, FlowContext, FlowKind, Keyboard, Reply, StepOutcome};
use crate::flows::{invalid_number, numeric_prompt, open_catalog, progress, render, select};
use crate::session::RootMenu;
use crate::validation::parse_measurement;

#[derive(Clone, Debug, PartialEq)]
pub enum SectorStep {
    SelectSector { sectors: LabelLookup },
    HydrantPressure { sector_id: i64 },
    EndPressure { sector_id: i64, hydrant_pressure: f64 },
    FlowRate { sector_id: i64, hydrant_pressure: f64, end_pressure: f64 },
}

impl SectorStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectSector { .. } => "sector.select",
            Self::HydrantPressure { .. } => "sector.hydrant_pressure",
            Self::EndPressure { .. } => "sector.end_pressure",
            Self::FlowRate { .. } => "sector.flow_rate",
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SectorFlow;

#[async_trait]
impl FlowDefinition for SectorFlow {
    type Step = SectorStep;

    fn kind(&self) -> FlowKind {
        FlowKind::Sector
    }

    async fn start(&self, ctx: &FlowContext<'_>) -> StepOutcome<SectorStep> {
        let sectors = match open_catalog(ctx, CatalogKind::Sector, self.kind()).await {
            Ok(sectors) => sectors,
            Err(outcome) => return outcome,
        };

        let reply = Reply::markdown("Which *sector* are you reviewing?")
            .with_keyboard(Keyboard::Options(sectors.labels()));
        StepOutcome::next(SectorStep::SelectSector { sectors }, reply)
    }

    async fn advance(
        &self,
        step: SectorStep,
        input: &str,
        ctx: &FlowContext<'_>,
    ) -> StepOutcome<SectorStep> {
        match step {
            SectorStep::SelectSector { sectors } => {
                let sector_id = match select(sectors, input, self.kind(), "sector", |sectors| {
                    SectorStep::SelectSector { sectors }
                }) {
                    Ok(id) => id,
                    Err(outcome) => return outcome,
                };
                StepOutcome::next(
                    SectorStep::HydrantPressure { sector_id },
                    numeric_prompt("1️⃣", "hydrant pressure", "bar", "3.5"),
                )
            }
            SectorStep::HydrantPressure { sector_id } => match parse_measurement(input) {
                Ok(hydrant_pressure) => StepOutcome::next(
                    SectorStep::EndPressure { sector_id, hydrant_pressure },
                    numeric_prompt("2️⃣", "pressure at the end of the sector", "bar", "1.0"),
                ),
                Err(_) => StepOutcome::reprompt(
                    SectorStep::HydrantPressure { sector_id },
                    invalid_number("hydrant pressure", "bar", "3.5"),
                ),
            },
            SectorStep::EndPressure { sector_id, hydrant_pressure } => {
                match parse_measurement(input) {
                    Ok(end_pressure) => StepOutcome::next(
                        SectorStep::FlowRate { sector_id, hydrant_pressure, end_pressure },
                        numeric_prompt("3️⃣", "sector flow rate", "m³/h", "20"),
                    ),
                    Err(_) => StepOutcome::reprompt(
                        SectorStep::EndPressure { sector_id, hydrant_pressure },
                        invalid_number("pressure at the end of the sector", "bar", "1.0"),
                    ),
                }
            }
            SectorStep::FlowRate { sector_id, hydrant_pressure, end_pressure } => {
                let flow_rate = match parse_measurement(input) {
                    Ok(flow_rate) => flow_rate,
                    Err(_) => {
                        return StepOutcome::reprompt(
                            SectorStep::FlowRate { sector_id, hydrant_pressure, end_pressure },
                            invalid_number("sector flow rate", "m³/h", "20"),
                        )
                    }
                };

                let reading = SectorReading::hydraulic(
                    sector_id,
                    ctx.user_id.clone(),
                    hydrant_pressure,
                    end_pressure,
                    flow_rate,
                );
                submit(ctx, &reading).await
            }
        }
    }
}

async fn submit(ctx: &FlowContext<'_>, reading: &SectorReading) -> StepOutcome<SectorStep> {
    let mut replies = vec![progress("Recording sector reading")];
    let completion = match ctx.gateway.submit_sector_reading(reading).await {
        Ok(result) => {
            info!(
                event_name = "flow.sector.submitted",
                sector_id = reading.sector_id,
                status = %result.status,
                record_id = ?result.record_id,
                "sector reading submitted"
            );
            replies.push(Reply::markdown(render::submission("Sector reading", &result)));
            if result.is_ok() {
                Completion::Submitted
            } else {
                Completion::SubmissionFailed
            }
        }
        Err(error) => {
            replies.push(Reply::text(render::gateway_failure("reading", &error)));
            Completion::SubmissionFailed
        }
    };
    StepOutcome::finish(RootMenu::Main, completion, replies)
}

#[cfg(test)]
mod tests {
    use super::{SectorFlow, SectorStep};
    use crate::domain::catalog::{CatalogEntry, CatalogKind};
    use crate::domain::reading::{SectorReading, SubmissionResult, UserId};
    use crate::flows::engine::FlowDefinition;
    use crate::flows::states::{Completion, FlowContext, StepOutcome};
    use crate::gateway::{GatewayError, RecordedCall, ScriptedGateway};

    fn gateway() -> ScriptedGateway {
        ScriptedGateway::default().with_catalog(
            CatalogKind::Sector,
            vec![CatalogEntry::new(3, Some("S03"), Some("Almendros"))],
        )
    }

    #[tokio::test]
    async fn start_lists_sector_labels() {
        let gateway = gateway();
        let user = UserId("7".to_owned());
        let ctx = FlowContext { gateway: &gateway, user_id: &user, alerts_limit: 20 };

        match SectorFlow.start(&ctx).await {
            StepOutcome::Continue { step: SectorStep::SelectSector { sectors }, .. } => {
                assert_eq!(sectors.labels(), vec!["S03 – Almendros".to_owned()]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn bad_flow_rate_keeps_both_pressures() {
        let gateway = gateway();
        let user = UserId("7".to_owned());
        let ctx = FlowContext { gateway: &gateway, user_id: &user, alerts_limit: 20 };
        let step = SectorStep::FlowRate { sector_id: 3, hydrant_pressure: 3.5, end_pressure: 1.0 };

        let outcome = SectorFlow.advance(step.clone(), "twenty", &ctx).await;
        assert!(matches!(outcome, StepOutcome::Reprompt { step: ref kept, .. } if *kept == step));
        assert!(gateway.submissions().is_empty());
    }

    #[tokio::test]
    async fn final_step_submits_all_three_values() {
        let gateway = gateway().with_submission_result(Ok(SubmissionResult::ok(Some(55))));
        let user = UserId("7".to_owned());
        let ctx = FlowContext { gateway: &gateway, user_id: &user, alerts_limit: 20 };
        let step = SectorStep::FlowRate { sector_id: 3, hydrant_pressure: 3.5, end_pressure: 1.0 };

        let outcome = SectorFlow.advance(step, "20", &ctx).await;
        match outcome {
            StepOutcome::Finish { completion, replies, .. } => {
                assert_eq!(completion, Completion::Submitted);
                assert!(replies.iter().any(|reply| reply.text.contains("(ID 55)")));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(
            gateway.submissions(),
            vec![RecordedCall::SectorReading(SectorReading::hydraulic(
                3,
                UserId("7".to_owned()),
                3.5,
                1.0,
                20.0
            ))]
        );
    }

    #[tokio::test]
    async fn transport_failure_still_finishes_the_flow() {
        let gateway = gateway()
            .with_submission_result(Err(GatewayError::Transport("connection reset".to_owned())));
        let user = UserId("7".to_owned());
        let ctx = FlowContext { gateway: &gateway, user_id: &user, alerts_limit: 20 };
        let step = SectorStep::FlowRate { sector_id: 3, hydrant_pressure: 3.5, end_pressure: 1.0 };

        match SectorFlow.advance(step, "20", &ctx).await {
            StepOutcome::Finish { completion, replies, .. } => {
                assert_eq!(completion, Completion::SubmissionFailed);
                assert!(replies[1].text.contains("Technical detail: transport failure"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
