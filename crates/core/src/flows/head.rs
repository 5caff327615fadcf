use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::catalog::{CatalogKind, LabelLookup};
use crate::domain::reading::HeadReading;
use crate::flows::engine::FlowDefinition;
use crate::flows::states::{Completion, FlowContext, FlowKind, Keyboard, Reply, StepOutcome};
use crate::flows::{invalid_number, numeric_prompt, open_catalog, progress, render, select};
use crate::session::RootMenu;
use crate::validation::parse_measurement;

#[derive(Clone, Debug, PartialEq)]
pub enum HeadStep {
    SelectHead { heads: LabelLookup },
    InletPressure { head_id: i64 },
    OutletPressure { head_id: i64, inlet_pressure: f64 },
}

impl HeadStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectHead { .. } => "head.select",
            Self::InletPressure { .. } => "head.inlet_pressure",
            Self::OutletPressure { .. } => "head.outlet_pressure",
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HeadFlow;

#[async_trait]
impl FlowDefinition for HeadFlow {
    type Step = HeadStep;

    fn kind(&self) -> FlowKind {
        FlowKind::Head
    }

    async fn start(&self, ctx: &FlowContext<'_>) -> StepOutcome<HeadStep> {
        let heads = match open_catalog(ctx, CatalogKind::Head, self.kind()).await {
            Ok(heads) => heads,
            Err(outcome) => return outcome,
        };

        let reply = Reply::markdown("Which *irrigation head* are you reviewing?")
            .with_keyboard(Keyboard::Options(heads.labels()));
        StepOutcome::next(HeadStep::SelectHead { heads }, reply)
    }

    async fn advance(
        &self,
        step: HeadStep,
        input: &str,
        ctx: &FlowContext<'_>,
    ) -> StepOutcome<HeadStep> {
        match step {
            HeadStep::SelectHead { heads } => {
                match select(heads, input, self.kind(), "head", |heads| HeadStep::SelectHead {
                    heads,
                }) {
                    Ok(head_id) => StepOutcome::next(
                        HeadStep::InletPressure { head_id },
                        numeric_prompt("1️⃣", "head inlet pressure", "bar", "3.0"),
                    ),
                    Err(outcome) => outcome,
                }
            }
            HeadStep::InletPressure { head_id } => match parse_measurement(input) {
                Ok(inlet_pressure) => StepOutcome::next(
                    HeadStep::OutletPressure { head_id, inlet_pressure },
                    numeric_prompt("2️⃣", "head outlet pressure", "bar", "2.7"),
                ),
                Err(_) => StepOutcome::reprompt(
                    HeadStep::InletPressure { head_id },
                    invalid_number("head inlet pressure", "bar", "3.0"),
                ),
            },
            HeadStep::OutletPressure { head_id, inlet_pressure } => {
                let outlet_pressure = match parse_measurement(input) {
                    Ok(outlet_pressure) => outlet_pressure,
                    Err(_) => {
                        return StepOutcome::reprompt(
                            HeadStep::OutletPressure { head_id, inlet_pressure },
                            invalid_number("head outlet pressure", "bar", "2.7"),
                        )
                    }
                };

                let reading = HeadReading {
                    head_id,
                    user_id: ctx.user_id.clone(),
                    inlet_pressure,
                    outlet_pressure,
                };
                submit(ctx, &reading).await
            }
        }
    }
}

async fn submit(ctx: &FlowContext<'_>, reading: &HeadReading) -> StepOutcome<HeadStep> {
    let mut replies = Vec::new();
    if reading.outlet_exceeds_inlet() {
        warn!(
            event_name = "flow.head.outlet_above_inlet",
            head_id = reading.head_id,
            inlet = reading.inlet_pressure,
            outlet = reading.outlet_pressure,
            "outlet pressure above inlet, submitting anyway"
        );
        replies.push(Reply::markdown(
            "⚠️ Careful: the outlet pressure is *higher* than the inlet pressure.\n\
             I'll record it anyway, double-check the gauges.",
        ));
    }
    replies.push(progress("Recording head reading"));

    let completion = match ctx.gateway.submit_head_reading(reading).await {
        Ok(result) => {
            info!(
                event_name = "flow.head.submitted",
                head_id = reading.head_id,
                delta_p = reading.delta_p(),
                status = %result.status,
                "head reading submitted"
            );
            replies.push(Reply::markdown(render::submission("Head reading", &result)));
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
