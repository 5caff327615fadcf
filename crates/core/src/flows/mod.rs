pub mod alert;
pub mod engine;
pub mod head;
pub mod incident;
pub mod menu;
pub mod pump;
pub mod render;
pub mod sector;
pub mod states;
pub mod trial;

pub use engine::{ConversationEngine, EngineSettings, FlowDefinition, Links};
pub use states::{
    Completion, FlowContext, FlowKind, Keyboard, Reply, StepOutcome, TransitionOutcome,
};

use tracing::warn;

use crate::domain::catalog::{CatalogKind, LabelLookup};
use crate::session::RootMenu;
use crate::validation::resolve_label;

/// Fetches a catalog and builds the keyboard lookup for a selection step.
///
/// A failed fetch and an empty catalog both end the flow on the management
/// menu, with different notices.
pub(crate) async fn open_catalog<S>(
    ctx: &FlowContext<'_>,
    kind: CatalogKind,
    flow: FlowKind,
) -> Result<LabelLookup, StepOutcome<S>> {
    let entries = match ctx.gateway.fetch_catalog(kind).await {
        Ok(entries) => entries,
        Err(error) => {
            warn!(
                event_name = "flow.catalog_unavailable",
                flow = flow.as_str(),
                catalog = kind.plural(),
                error = %error,
                "catalog fetch failed"
            );
            return Err(StepOutcome::finish(
                RootMenu::Management,
                Completion::Aborted,
                vec![catalog_unavailable(kind)],
            ));
        }
    };

    if entries.is_empty() {
        return Err(StepOutcome::finish(
            RootMenu::Management,
            Completion::NothingToDo,
            vec![catalog_empty(kind)],
        ));
    }

    Ok(LabelLookup::from_catalog(kind, &entries))
}

/// Resolves a typed label against the lookup cached in a selection step.
///
/// Unknown labels hand the lookup back in a reprompt; an empty lookup means
/// the step was built without candidates and the flow has to restart.
pub(crate) fn select<T, S>(
    lookup: LabelLookup<T>,
    input: &str,
    flow: FlowKind,
    noun: &str,
    rebuild: impl FnOnce(LabelLookup<T>) -> S,
) -> Result<T, StepOutcome<S>>
where
    T: Clone,
{
    if lookup.is_empty() {
        return Err(internal_consistency(flow, noun));
    }

    match resolve_label(&lookup, input) {
        Ok(value) => Ok(value),
        Err(_) => {
            let reply = Reply::markdown(format!(
                "I don't recognise that {noun}.\n\nPlease pick *one of the options in the list*."
            ))
            .with_keyboard(Keyboard::Options(lookup.labels()));
            Err(StepOutcome::reprompt(rebuild(lookup), reply))
        }
    }
}

pub(crate) fn internal_consistency<S>(flow: FlowKind, noun: &str) -> StepOutcome<S> {
    warn!(
        event_name = "flow.internal_consistency",
        flow = flow.as_str(),
        missing = noun,
        "selection step has no candidates"
    );
    StepOutcome::finish(
        RootMenu::Main,
        Completion::Aborted,
        vec![Reply::markdown(format!(
            "There was an internal problem: I lost track of the {noun} for this flow.\n\
             Start again from *{}*.",
            flow.restart_hint()
        ))],
    )
}

pub(crate) fn invalid_number(what: &str, unit: &str, example: &str) -> Reply {
    Reply::markdown(format!(
        "I couldn't read that value.\n\n\
         Type only the number for the *{what}* in {unit}.\nExample: {example}"
    ))
    .with_keyboard(Keyboard::Cancel)
}

pub(crate) fn numeric_prompt(position: &str, what: &str, unit: &str, example: &str) -> Reply {
    Reply::markdown(format!("{position} Type the *{what}* ({unit}).\nExample: {example}"))
        .with_keyboard(Keyboard::Cancel)
}

pub(crate) fn progress(action: &str) -> Reply {
    Reply::text(format!("{action}… ⏳"))
}

fn catalog_unavailable(kind: CatalogKind) -> Reply {
    Reply::text(format!(
        "There was a problem fetching the {} from the system.\n\
         Try again later or tell the person in charge.",
        kind.plural()
    ))
}

fn catalog_empty(kind: CatalogKind) -> Reply {
    Reply::text(format!(
        "There are no {} configured for this farm.\nAsk the person in charge to set them up.",
        kind.plural()
    ))
}

#[cfg(test)]
mod tests {
    use super::{open_catalog, select};
    use crate::domain::catalog::{CatalogEntry, CatalogKind, LabelLookup};
    use crate::domain::reading::UserId;
    use crate::flows::states::{Completion, FlowContext, FlowKind, Keyboard, StepOutcome};
    use crate::gateway::{GatewayError, ScriptedGateway};
    use crate::session::RootMenu;

    #[tokio::test]
    async fn failed_and_empty_catalogs_finish_on_management_menu() {
        let gateway = ScriptedGateway::default()
            .with_catalog_error(CatalogKind::Head, GatewayError::Timeout { secs: 10 });
        let user = UserId("1".to_owned());
        let ctx = FlowContext { gateway: &gateway, user_id: &user, alerts_limit: 20 };

        let failed = open_catalog::<()>(&ctx, CatalogKind::Head, FlowKind::Head).await;
        assert!(matches!(
            failed,
            Err(StepOutcome::Finish {
                to: RootMenu::Management,
                completion: Completion::Aborted,
                ..
            })
        ));

        let empty = open_catalog::<()>(&ctx, CatalogKind::Pump, FlowKind::Pump).await;
        assert!(matches!(
            empty,
            Err(StepOutcome::Finish { completion: Completion::NothingToDo, .. })
        ));
    }

    #[test]
    fn unknown_label_reprompts_with_the_same_options() {
        let lookup = LabelLookup::from_catalog(
            CatalogKind::Sector,
            &[CatalogEntry::new(1, Some("S1"), Some("Norte"))],
        );

        let outcome = select(lookup.clone(), "S9", FlowKind::Sector, "sector", |lookup| lookup);
        match outcome {
            Err(StepOutcome::Reprompt { step, replies }) => {
                assert_eq!(step, lookup);
                assert_eq!(replies[0].keyboard, Keyboard::Options(vec!["S1 – Norte".to_owned()]));
            }
            other => panic!("expected reprompt, got {other:?}"),
        }
    }

    #[test]
    fn empty_lookup_is_an_internal_consistency_failure() {
        let outcome =
            select(LabelLookup::<i64>::default(), "S1", FlowKind::Trial, "sector", |lookup| lookup);
        match outcome {
            Err(StepOutcome::Finish { to, replies, completion }) => {
                assert_eq!(to, RootMenu::Main);
                assert_eq!(completion, Completion::Aborted);
                assert!(replies[0].text.contains("Register dripper CV"));
            }
            other => panic!("expected finish, got {other:?}"),
        }
    }
}
