//! Root menus, their button captions and the fixed texts behind them.

use crate::flows::render::escape_markdown;
use crate::validation::{is_cancel, normalize_keyword};

pub const IRRIGATION_MANAGEMENT: &str = "Irrigation management";
pub const IRRIGATION_IMPROVEMENT: &str = "Irrigation improvement";
pub const DOCUMENTATION: &str = "Documentation";
pub const HELP: &str = "Help";

pub const CONTROL_PANEL: &str = "Control panel";
pub const REVIEW: &str = "Review";
pub const MAINTENANCE: &str = "Maintenance";
pub const INCIDENTS: &str = "Incidents";
pub const REGISTER_SECTOR: &str = "Register sector";
pub const REGISTER_HEAD: &str = "Register head";
pub const REGISTER_PUMP: &str = "Register pump";
pub const REGISTER_DRIPPER_CV: &str = "Register dripper CV";

pub const OPEN_ALERTS: &str = "🚨 Open alerts";
pub const CANCEL: &str = "🔴 Cancel";
pub const SKIP: &str = "Skip";
pub const YES: &str = "Yes";
pub const NO: &str = "No";

pub const GREETING: &str = "A farm can have all the technology in the world, but remember this: \
*if irrigation doesn't work as it should, the harvest will fail you.*\n\n\
Here we work on what really matters.";

pub const REVIEW_INTRO: &str = "*This is the key to everything, so take the time you need to do it right.*\n\n\
And remember: what you don't check and write down today doesn't exist tomorrow.";

pub const MAINTENANCE_INTRO: &str = "*Good maintenance is what keeps things from getting out of hand.*\n\n\
Pick *Open alerts* to see what is pending and record what you did about it.";

pub const CANCELLED: &str = "Operation cancelled. Back to the main menu.";

pub const NOT_UNDERSTOOD_MAIN: &str = "I didn't understand you. Please use the buttons.";
pub const NOT_UNDERSTOOD_MANAGEMENT: &str = "I didn't understand you. Use the menu buttons.";
pub const NOT_UNDERSTOOD_MAINTENANCE: &str =
    "Pick an option from the menu (Open alerts) or press 🔴 Cancel.";

pub const HELP_TEXT: &str = "⭐️ From the main menu go into \"*Irrigation management*\".\n\n\
There you have:\n\
– *Control panel*: an overview of how your irrigation system is doing and the link to the full panel.\n\n\
– *Review*: your day to day. From here you can:\n\
\u{2003}• *Register sector*: sector pressures and flow rate.\n\
\u{2003}• *Register head*: head inlet and outlet pressures.\n\
\u{2003}• *Register pump*: pressure, flow rate, start-up and general state of the pump.\n\
\u{2003}• *Register dripper CV*: 16-dripper trial and CV computation to check irrigation uniformity.\n\n\
– *Maintenance*: see the *open alerts* and record what was done to resolve them. \
Each action is stored as corrective maintenance and the alert is marked as resolved.\n\n\
– *Incidents*: anything that caught your attention, e.g. chewed hoses at the end of sector 4 \
or burst joints in sector 12.\n\n\n\
⭐️ In \"*Irrigation improvement*\" you can see what has been done, what is being worked on and the next steps.\n\n\n\
⭐️ And in \"*Documentation*\" you have manuals, field procedures and protocols.\n\n\n\
At any moment you can use *🔴 Cancel* to go back to the start.\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MainChoice {
    Management,
    Improvement,
    Documentation,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManagementChoice {
    ControlPanel,
    Review,
    RegisterSector,
    RegisterHead,
    RegisterPump,
    RegisterDripperCv,
    Maintenance,
    Incidents,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaintenanceChoice {
    OpenAlerts,
}

/// Captions are matched case-insensitively after trimming.
pub fn parse_main(input: &str) -> Option<MainChoice> {
    let key = normalize_keyword(input);
    [
        (IRRIGATION_MANAGEMENT, MainChoice::Management),
        (IRRIGATION_IMPROVEMENT, MainChoice::Improvement),
        (DOCUMENTATION, MainChoice::Documentation),
        (HELP, MainChoice::Help),
    ]
    .into_iter()
    .find(|(caption, _)| caption.to_lowercase() == key)
    .map(|(_, choice)| choice)
}

pub fn parse_management(input: &str) -> Option<ManagementChoice> {
    if is_cancel(input) {
        return Some(ManagementChoice::Cancel);
    }
    let key = normalize_keyword(input);
    [
        (CONTROL_PANEL, ManagementChoice::ControlPanel),
        (REVIEW, ManagementChoice::Review),
        (REGISTER_SECTOR, ManagementChoice::RegisterSector),
        (REGISTER_HEAD, ManagementChoice::RegisterHead),
        (REGISTER_PUMP, ManagementChoice::RegisterPump),
        (REGISTER_DRIPPER_CV, ManagementChoice::RegisterDripperCv),
        (MAINTENANCE, ManagementChoice::Maintenance),
        (INCIDENTS, ManagementChoice::Incidents),
    ]
    .into_iter()
    .find(|(caption, _)| caption.to_lowercase() == key)
    .map(|(_, choice)| choice)
}

/// Any input mentioning alerts opens them, with or without the emoji.
pub fn parse_maintenance(input: &str) -> Option<MaintenanceChoice> {
    normalize_keyword(input).contains("alerts").then_some(MaintenanceChoice::OpenAlerts)
}

pub fn improvement_text(url: &str) -> String {
    let url = escape_markdown(url);
    format!(
        "📈 *Irrigation improvement*\n\n\
         What has been done, what is being worked on and the next steps.\n\n{url}"
    )
}

pub fn documentation_text(url: &str) -> String {
    let url = escape_markdown(url);
    format!(
        "📚 *Documentation*\n\n\
         Work manuals, field procedures, protocols and documents, all on a single page.\n\n{url}"
    )
}

pub fn control_panel_text(summary: &str, url: &str) -> String {
    let url = escape_markdown(url);
    format!("📊 *Irrigation system control panel*\n\n{summary}\n\n🔗 Full panel:\n{url}")
}

pub const SUMMARY_UNAVAILABLE: &str = "I couldn't reach the panel to get the summary.\n\
Open the panel from the link to see the current state.";

#[cfg(test)]
mod tests {
    use super::{
        control_panel_text, parse_main, parse_maintenance, parse_management, MainChoice,
        MaintenanceChoice, ManagementChoice,
    };

    #[test]
    fn captions_match_case_insensitively() {
        assert_eq!(parse_main(" irrigation MANAGEMENT "), Some(MainChoice::Management));
        assert_eq!(parse_main("help"), Some(MainChoice::Help));
        assert_eq!(parse_main("hello"), None);
        assert_eq!(
            parse_management("register dripper cv"),
            Some(ManagementChoice::RegisterDripperCv)
        );
    }

    #[test]
    fn management_menu_understands_cancel() {
        assert_eq!(parse_management("🔴 Cancel"), Some(ManagementChoice::Cancel));
        assert_eq!(parse_management("cancel"), Some(ManagementChoice::Cancel));
    }

    #[test]
    fn links_with_underscores_are_escaped() {
        let text = control_panel_text("summary", "https://riego.example.test/panel_finca");
        assert!(text.ends_with("https://riego.example.test/panel\\_finca"));
    }

    #[test]
    fn maintenance_menu_accepts_any_alerts_caption() {
        assert_eq!(parse_maintenance("🚨 Open alerts"), Some(MaintenanceChoice::OpenAlerts));
        assert_eq!(parse_maintenance("alerts"), Some(MaintenanceChoice::OpenAlerts));
        assert_eq!(parse_maintenance("filters"), None);
    }
}
