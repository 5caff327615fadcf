use async_trait::async_trait;
use tracing::info;

use crate::domain::catalog::{CatalogKind, LabelLookup};
use crate::domain::reading::SectorReading;
use crate::errors::DomainError;
use crate::flows::engine::FlowDefinition;
use crate::flows::states::{Completion, FlowContext, FlowKind, Keyboard, Reply, StepOutcome};
use crate::flows::{open_catalog, progress, render, select};
use crate::session::RootMenu;
use crate::uniformity::{TrialSample, MIN_TRIAL_SAMPLES};

#[derive(Clone, Debug, PartialEq)]
pub enum TrialStep {
    SelectSector { sectors: LabelLookup },
    Measurements { sector_id: i64 },
}

impl TrialStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectSector { .. } => "trial.select_sector",
            Self::Measurements { .. } => "trial.measurements",
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TrialFlow;

#[async_trait]
impl FlowDefinition for TrialFlow {
    type Step = TrialStep;

    fn kind(&self) -> FlowKind {
        FlowKind::Trial
    }

    async fn start(&self, ctx: &FlowContext<'_>) -> StepOutcome<TrialStep> {
        let sectors = match open_catalog(ctx, CatalogKind::Sector, self.kind()).await {
            Ok(sectors) => sectors,
            Err(outcome) => return outcome,
        };

        let reply =
            Reply::markdown("Pick the *sector* where you are running the dripper trial (CV):")
                .with_keyboard(Keyboard::Options(sectors.labels()));
        StepOutcome::next(TrialStep::SelectSector { sectors }, reply)
    }

    async fn advance(
        &self,
        step: TrialStep,
        input: &str,
        ctx: &FlowContext<'_>,
    ) -> StepOutcome<TrialStep> {
        match step {
            TrialStep::SelectSector { sectors } => {
                match select(sectors, input, self.kind(), "sector", |sectors| {
                    TrialStep::SelectSector { sectors }
                }) {
                    Ok(sector_id) => {
                        StepOutcome::next(TrialStep::Measurements { sector_id }, instructions())
                    }
                    Err(outcome) => outcome,
                }
            }
            TrialStep::Measurements { sector_id } => {
                if input.trim().is_empty() {
                    return StepOutcome::reprompt(
                        TrialStep::Measurements { sector_id },
                        Reply::text(format!(
                            "I didn't receive any number.\n\n{}",
                            measurement_example()
                        ))
                        .with_keyboard(Keyboard::Cancel),
                    );
                }

                let sample = match TrialSample::parse(input) {
                    Ok(sample) => sample,
                    Err(DomainError::InsufficientSamples { found, required }) => {
                        return StepOutcome::reprompt(
                            TrialStep::Measurements { sector_id },
                            too_few_values(found, required),
                        )
                    }
                    Err(_) => {
                        return StepOutcome::reprompt(
                            TrialStep::Measurements { sector_id },
                            too_few_values(0, MIN_TRIAL_SAMPLES),
                        )
                    }
                };

                submit(ctx, sector_id, &sample).await
            }
        }
    }
}

async fn submit(
    ctx: &FlowContext<'_>,
    sector_id: i64,
    sample: &TrialSample,
) -> StepOutcome<TrialStep> {
    let stat = match sample.stats() {
        Ok(stat) => stat,
        Err(_) => return super::internal_consistency(FlowKind::Trial, "measurements"),
    };

    let reading = SectorReading::uniformity(sector_id, ctx.user_id.clone(), stat.cv);
    let outcome = ctx.gateway.submit_sector_reading(&reading).await;
    info!(
        event_name = "flow.trial.submitted",
        sector_id,
        samples = sample.len(),
        cv = stat.cv,
        band = stat.band.label(),
        ok = matches!(&outcome, Ok(result) if result.is_ok()),
        "dripper trial computed"
    );

    let completion = match &outcome {
        Ok(result) if result.is_ok() => Completion::Submitted,
        _ => Completion::SubmissionFailed,
    };
    StepOutcome::finish(
        RootMenu::Main,
        completion,
        vec![progress("Recording dripper trial"), Reply::markdown(render::trial(&stat, &outcome))],
    )
}

fn instructions() -> Reply {
    Reply::markdown(format!(
        "We are going to run the *dripper trial (CV)* in this sector.\n\n\
         👉 Measure *{MIN_TRIAL_SAMPLES} drippers* in total:\n\
         • 4 different zones of the sector × 4 drippers in each zone.\n\
         • Each value is the volume collected in *5 minutes*, in millilitres (mL/5min).\n\n\
         When you are done, type *all the values on a single line*, separated by commas.\n\
         Example:\n`120, 118, 125, 130, 119, ...`\n\n\
         At least *{MIN_TRIAL_SAMPLES} values* are needed."
    ))
    .with_keyboard(Keyboard::Cancel)
}

fn too_few_values(found: usize, required: usize) -> Reply {
    Reply::markdown(format!(
        "I could read {found} numeric values, but I need *at least {required}*.\n\n{}",
        measurement_example()
    ))
    .with_keyboard(Keyboard::Cancel)
}

fn measurement_example() -> &'static str {
    "Type the values again on a single line, separated by commas.\n\
     Example: 120, 118, 125, 130, 119, ..."
}

#[cfg(test)]
mod tests {
    use super::{TrialFlow, TrialStep};
    use crate::domain::reading::UserId;
    use crate::flows::engine::FlowDefinition;
    use crate::flows::states::{Completion, FlowContext, StepOutcome};
    use crate::gateway::{GatewayError, RecordedCall, ScriptedGateway};

    const SIXTEEN: &str =
        "120, 118, 125, 130, 119, 121, 123, 117, 122, 124, 120, 119, 126, 118, 121, 120";

    #[tokio::test]
    async fn too_few_values_reprompt_without_submitting() {
        let gateway = ScriptedGateway::default();
        let user = UserId("5".to_owned());
        let ctx = FlowContext { gateway: &gateway, user_id: &user, alerts_limit: 20 };

        let outcome = TrialFlow
            .advance(TrialStep::Measurements { sector_id: 2 }, "10, 20, abc, 30", &ctx)
            .await;
        match outcome {
            StepOutcome::Reprompt { step, replies } => {
                assert_eq!(step, TrialStep::Measurements { sector_id: 2 });
                assert!(replies[0].text.contains("I could read 3 numeric values"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn statistic_is_rendered_even_when_transport_fails() {
        let gateway = ScriptedGateway::default()
            .with_submission_result(Err(GatewayError::Timeout { secs: 10 }));
        let user = UserId("5".to_owned());
        let ctx = FlowContext { gateway: &gateway, user_id: &user, alerts_limit: 20 };

        let outcome =
            TrialFlow.advance(TrialStep::Measurements { sector_id: 2 }, SIXTEEN, &ctx).await;
        match outcome {
            StepOutcome::Finish { completion, replies, .. } => {
                assert_eq!(completion, Completion::SubmissionFailed);
                let text = &replies[1].text;
                assert!(text.contains("Mean flow (mL/5min): *121.4*"));
                assert!(text.contains("Interpretation: *Excellent*"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        match gateway.submissions().as_slice() {
            [RecordedCall::SectorReading(reading)] => {
                assert_eq!(reading.sector_id, 2);
                assert_eq!(reading.hydrant_pressure, None);
                assert!(reading.dripper_cv.is_some_and(|cv| cv < 5.0));
            }
            other => panic!("unexpected submissions {other:?}"),
        }
    }
}
