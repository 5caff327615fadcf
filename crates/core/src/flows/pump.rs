use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::catalog::{CatalogKind, LabelLookup};
use crate::domain::reading::PumpReading;
use crate::flows::engine::FlowDefinition;
use crate::flows::states::{Completion, FlowContext, FlowKind, Keyboard, Reply, StepOutcome};
use crate::flows::{invalid_number, numeric_prompt, open_catalog, progress, render, select};
use crate::session::RootMenu;
use crate::validation::{is_skip, normalize_keyword, parse_measurement, parse_yes_no};

/// Numbers collected before the yes/no checklist starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PumpMeasurements {
    pub pump_id: i64,
    pub shift_id: i64,
    pub pressure: f64,
    pub flow_rate: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PumpStep {
    SelectPump { pumps: LabelLookup },
    SelectShift { pump_id: i64, shifts: LabelLookup },
    Pressure { pump_id: i64, shift_id: i64 },
    FlowRate { pump_id: i64, shift_id: i64, pressure: f64 },
    StartupOk { measured: PumpMeasurements },
    Vibration { measured: PumpMeasurements, startup_ok: bool },
    Leak { measured: PumpMeasurements, startup_ok: bool, vibration: bool },
    Observations { measured: PumpMeasurements, startup_ok: bool, vibration: bool, leak: bool },
}

impl PumpStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectPump { .. } => "pump.select",
            Self::SelectShift { .. } => "pump.select_shift",
            Self::Pressure { .. } => "pump.pressure",
            Self::FlowRate { .. } => "pump.flow_rate",
            Self::StartupOk { .. } => "pump.startup_ok",
            Self::Vibration { .. } => "pump.vibration",
            Self::Leak { .. } => "pump.leak",
            Self::Observations { .. } => "pump.observations",
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PumpFlow;

#[async_trait]
impl FlowDefinition for PumpFlow {
    type Step = PumpStep;

    fn kind(&self) -> FlowKind {
        FlowKind::Pump
    }

    async fn start(&self, ctx: &FlowContext<'_>) -> StepOutcome<PumpStep> {
        let pumps = match open_catalog(ctx, CatalogKind::Pump, self.kind()).await {
            Ok(pumps) => pumps,
            Err(outcome) => return outcome,
        };

        let reply = Reply::text("Which pump are you going to check?")
            .with_keyboard(Keyboard::Options(pumps.labels()));
        StepOutcome::next(PumpStep::SelectPump { pumps }, reply)
    }

    async fn advance(
        &self,
        step: PumpStep,
        input: &str,
        ctx: &FlowContext<'_>,
    ) -> StepOutcome<PumpStep> {
        match step {
            PumpStep::SelectPump { pumps } => {
                let pump_id = match select(pumps, input, self.kind(), "pump", |pumps| {
                    PumpStep::SelectPump { pumps }
                }) {
                    Ok(pump_id) => pump_id,
                    Err(outcome) => return outcome,
                };
                open_shifts(ctx, pump_id).await
            }
            PumpStep::SelectShift { pump_id, shifts } => {
                match select(shifts, input, self.kind(), "shift", |shifts| PumpStep::SelectShift {
                    pump_id,
                    shifts,
                }) {
                    Ok(shift_id) => StepOutcome::next(
                        PumpStep::Pressure { pump_id, shift_id },
                        numeric_prompt("1️⃣", "current pump pressure", "bar", "3.5"),
                    ),
                    Err(outcome) => outcome,
                }
            }
            PumpStep::Pressure { pump_id, shift_id } => match parse_measurement(input) {
                Ok(pressure) => StepOutcome::next(
                    PumpStep::FlowRate { pump_id, shift_id, pressure },
                    numeric_prompt("2️⃣", "flow rate you measured", "m³/h", "25"),
                ),
                Err(_) => StepOutcome::reprompt(
                    PumpStep::Pressure { pump_id, shift_id },
                    invalid_number("pump pressure", "bar", "3.5"),
                ),
            },
            PumpStep::FlowRate { pump_id, shift_id, pressure } => match parse_measurement(input) {
                Ok(flow_rate) => StepOutcome::next(
                    PumpStep::StartupOk {
                        measured: PumpMeasurements { pump_id, shift_id, pressure, flow_rate },
                    },
                    yes_no_question("Did it start up properly?"),
                ),
                Err(_) => StepOutcome::reprompt(
                    PumpStep::FlowRate { pump_id, shift_id, pressure },
                    invalid_number("pump flow rate", "m³/h", "25"),
                ),
            },
            PumpStep::StartupOk { measured } => match parse_yes_no(input) {
                Ok(startup_ok) => StepOutcome::next(
                    PumpStep::Vibration { measured, startup_ok },
                    yes_no_question("Any unusual vibration or noise?"),
                ),
                Err(_) => StepOutcome::reprompt(
                    PumpStep::StartupOk { measured },
                    yes_no_retry("Did it start up properly?"),
                ),
            },
            PumpStep::Vibration { measured, startup_ok } => match parse_yes_no(input) {
                Ok(vibration) => StepOutcome::next(
                    PumpStep::Leak { measured, startup_ok, vibration },
                    yes_no_question("Are there leaks around the pump?"),
                ),
                Err(_) => StepOutcome::reprompt(
                    PumpStep::Vibration { measured, startup_ok },
                    yes_no_retry("Any unusual vibration or noise?"),
                ),
            },
            PumpStep::Leak { measured, startup_ok, vibration } => match parse_yes_no(input) {
                Ok(leak) => StepOutcome::next(
                    PumpStep::Observations { measured, startup_ok, vibration, leak },
                    Reply::text("Anything else you want to note? Type it, or send `No` or `Skip`.")
                        .with_keyboard(Keyboard::CancelOrSkip),
                ),
                Err(_) => StepOutcome::reprompt(
                    PumpStep::Leak { measured, startup_ok, vibration },
                    yes_no_retry("Are there leaks around the pump?"),
                ),
            },
            PumpStep::Observations { measured, startup_ok, vibration, leak } => {
                let reading = PumpReading {
                    pump_id: measured.pump_id,
                    shift_id: measured.shift_id,
                    user_id: ctx.user_id.clone(),
                    pressure: measured.pressure,
                    flow_rate: measured.flow_rate,
                    startup_ok,
                    vibration,
                    leak,
                    observations: observations(input),
                };
                submit(ctx, &reading).await
            }
        }
    }
}

async fn open_shifts(ctx: &FlowContext<'_>, pump_id: i64) -> StepOutcome<PumpStep> {
    let shifts = match ctx.gateway.fetch_shifts(pump_id).await {
        Ok(shifts) => shifts,
        Err(error) => {
            warn!(
                event_name = "flow.pump.shifts_unavailable",
                pump_id,
                error = %error,
                "shift fetch failed"
            );
            return StepOutcome::finish(
                RootMenu::Management,
                Completion::Aborted,
                vec![Reply::text(format!(
                    "I couldn't load the shifts for this pump.\nTechnical detail: {error}"
                ))],
            );
        }
    };

    if shifts.is_empty() {
        return StepOutcome::finish(
            RootMenu::Management,
            Completion::NothingToDo,
            vec![Reply::text("This pump has no shifts configured.")],
        );
    }

    let shifts = LabelLookup::from_catalog(CatalogKind::Shift, &shifts);
    let reply = Reply::text("Which shift are you checking?")
        .with_keyboard(Keyboard::Options(shifts.labels()));
    StepOutcome::next(PumpStep::SelectShift { pump_id, shifts }, reply)
}

fn observations(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() || is_skip(trimmed) || normalize_keyword(trimmed) == "no" {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

fn yes_no_question(question: &str) -> Reply {
    Reply::text(question).with_keyboard(Keyboard::YesNo)
}

fn yes_no_retry(question: &str) -> Reply {
    Reply::text(format!("Please answer Yes or No.\n{question}")).with_keyboard(Keyboard::YesNo)
}

async fn submit(ctx: &FlowContext<'_>, reading: &PumpReading) -> StepOutcome<PumpStep> {
    let mut replies = vec![progress("Recording pump reading")];
    let completion = match ctx.gateway.submit_pump_reading(reading).await {
        Ok(result) => {
            info!(
                event_name = "flow.pump.submitted",
                pump_id = reading.pump_id,
                shift_id = reading.shift_id,
                status = %result.status,
                "pump reading submitted"
            );
            replies.push(Reply::markdown(render::submission("Pump reading", &result)));
            if result.is_ok() {
                Completion::Submitted
            } else {
                Completion::SubmissionFailed
            }
        }
        Err(error) => {
            replies.push(Reply::text(render::gateway_failure("pump reading", &error)));
            Completion::SubmissionFailed
        }
    };
    StepOutcome::finish(RootMenu::Main, completion, replies)
}

#[cfg(test)]
mod tests {
    use super::{observations, PumpFlow, PumpMeasurements, PumpStep};
    use crate::domain::catalog::{CatalogEntry, CatalogKind, LabelLookup};
    use crate::domain::reading::UserId;
    use crate::flows::engine::FlowDefinition;
    use crate::flows::states::{Completion, FlowContext, StepOutcome};
    use crate::gateway::{GatewayError, RecordedCall, ScriptedGateway};
    use crate::session::RootMenu;

    fn measured() -> PumpMeasurements {
        PumpMeasurements { pump_id: 1, shift_id: 4, pressure: 3.5, flow_rate: 25.0 }
    }

    fn pumps() -> LabelLookup {
        LabelLookup::from_catalog(CatalogKind::Pump, &[CatalogEntry::new(1, None, Some("Pozo 1"))])
    }

    #[test]
    fn observation_keywords_mean_nothing_to_note() {
        assert_eq!(observations("No"), None);
        assert_eq!(observations(" skip "), None);
        assert_eq!(observations(""), None);
        assert_eq!(observations("Noisy bearing"), Some("Noisy bearing".to_owned()));
    }

    #[tokio::test]
    async fn shift_failure_aborts_to_management_menu() {
        let gateway = ScriptedGateway::default()
            .with_shifts_error(1, GatewayError::Transport("down".to_owned()));
        let user = UserId("3".to_owned());
        let ctx = FlowContext { gateway: &gateway, user_id: &user, alerts_limit: 20 };

        let outcome =
            PumpFlow.advance(PumpStep::SelectPump { pumps: pumps() }, "Pozo 1", &ctx).await;
        assert!(matches!(
            outcome,
            StepOutcome::Finish { to: RootMenu::Management, completion: Completion::Aborted, .. }
        ));
    }

    #[tokio::test]
    async fn empty_shift_list_aborts_to_management_menu() {
        let gateway = ScriptedGateway::default();
        let user = UserId("3".to_owned());
        let ctx = FlowContext { gateway: &gateway, user_id: &user, alerts_limit: 20 };

        let outcome =
            PumpFlow.advance(PumpStep::SelectPump { pumps: pumps() }, "Pozo 1", &ctx).await;
        assert!(matches!(outcome, StepOutcome::Finish { to: RootMenu::Management, .. }));
        assert_eq!(gateway.calls(), vec![RecordedCall::FetchShifts(1)]);
    }

    #[tokio::test]
    async fn unclear_answer_repeats_the_question() {
        let gateway = ScriptedGateway::default();
        let user = UserId("3".to_owned());
        let ctx = FlowContext { gateway: &gateway, user_id: &user, alerts_limit: 20 };
        let step = PumpStep::Vibration { measured: measured(), startup_ok: true };

        let outcome = PumpFlow.advance(step.clone(), "maybe", &ctx).await;
        assert!(matches!(outcome, StepOutcome::Reprompt { step: ref kept, .. } if *kept == step));
    }

    #[tokio::test]
    async fn observations_step_submits_the_checklist() {
        let gateway = ScriptedGateway::default();
        let user = UserId("3".to_owned());
        let ctx = FlowContext { gateway: &gateway, user_id: &user, alerts_limit: 20 };
        let step = PumpStep::Observations {
            measured: measured(),
            startup_ok: true,
            vibration: false,
            leak: true,
        };

        let outcome = PumpFlow.advance(step, "skip", &ctx).await;
        assert!(matches!(outcome, StepOutcome::Finish { completion: Completion::Submitted, .. }));
        match gateway.submissions().as_slice() {
            [RecordedCall::PumpReading(reading)] => {
                assert_eq!(reading.shift_id, 4);
                assert!(reading.startup_ok && reading.leak && !reading.vibration);
                assert_eq!(reading.observations, None);
            }
            other => panic!("unexpected submissions {other:?}"),
        }
    }
}
