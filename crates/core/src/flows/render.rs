//! Texts built from gateway answers and computed statistics.
//!
//! Replies rendered here go out with Markdown formatting, so anything the
//! service sent back passes through [`escape_markdown`] first.

use crate::domain::reading::{FarmSummary, MaintenanceResult, SubmissionResult, TrafficLight};
use crate::gateway::GatewayError;
use crate::uniformity::DerivedStat;

/// Success or failure line for a reading, with any alerts the service raised.
pub fn submission(subject: &str, result: &SubmissionResult) -> String {
    let mut text = if result.is_ok() {
        let mut line = format!("✅ {subject} recorded successfully.");
        if let Some(id) = result.record_id {
            line.push_str(&format!(" (ID {id})"));
        }
        if let Some(message) = non_empty(result.message.as_deref()) {
            line.push('\n');
            line.push_str(&escape_markdown(message));
        }
        line
    } else {
        let mut line = format!("❌ Something went wrong recording the {}.", subject.to_lowercase());
        if let Some(message) = non_empty(result.message.as_deref()) {
            line.push_str(&format!("\nDetail: {}", escape_markdown(message)));
        }
        line
    };

    if result.has_alert && !result.alerts.is_empty() {
        text.push_str("\n\n⚠️ *Alerts raised by this reading:*");
        for alert in &result.alerts {
            text.push_str(&format!("\n• {}", escape_markdown(alert)));
        }
    }
    text
}

pub fn gateway_failure(subject: &str, error: &GatewayError) -> String {
    format!(
        "❌ Error sending the {} to the system.\nTechnical detail: {error}",
        subject.to_lowercase()
    )
}

pub fn trial_figures(stat: &DerivedStat) -> String {
    format!(
        "Mean flow (mL/5min): *{:.1}*\nCV: *{:.1} %*\nInterpretation: *{}*",
        stat.display_mean(),
        stat.display_cv(),
        stat.band.label()
    )
}

/// The statistic is shown whatever happened to the submission.
pub fn trial(stat: &DerivedStat, outcome: &Result<SubmissionResult, GatewayError>) -> String {
    let figures = trial_figures(stat);
    match outcome {
        Ok(result) if result.is_ok() => format!("✅ Dripper trial (CV) recorded.\n\n{figures}"),
        Ok(result) => format!(
            "⚠️ The trial was computed but the system could not store it.\nDetail: {}\n\n{figures}",
            escape_markdown(non_empty(result.message.as_deref()).unwrap_or("Unknown error"))
        ),
        Err(error) => format!(
            "❌ The trial was computed but sending it to the system failed.\n\
             Technical detail: {}\n\n{figures}",
            escape_markdown(&error.to_string())
        ),
    }
}

pub fn maintenance(outcome: &Result<MaintenanceResult, GatewayError>) -> String {
    match outcome {
        Ok(result) if result.is_ok() => {
            "✅ Corrective maintenance recorded and the alert marked as *resolved*.".to_owned()
        }
        Ok(result) => format!(
            "⚠️ The corrective maintenance could not be recorded, the service answered:\n{}",
            escape_markdown(
                non_empty(result.message.as_deref()).unwrap_or("Unknown maintenance error.")
            )
        ),
        Err(error) => {
            format!("❌ Error talking to the system: {}", escape_markdown(&error.to_string()))
        }
    }
}

pub fn incident(outcome: &Result<SubmissionResult, GatewayError>) -> String {
    match outcome {
        Ok(result) if result.is_ok() => {
            let message = non_empty(result.message.as_deref()).unwrap_or("Incident recorded.");
            match result.record_id {
                Some(id) => format!("✅ {message} (ID {id})"),
                None => format!("✅ {message}"),
            }
        }
        Ok(result) => format!(
            "❌ Something went wrong recording the incident: {}",
            non_empty(result.message.as_deref()).unwrap_or("Unknown error")
        ),
        Err(error) => format!("❌ Error sending the incident to the system: {error}"),
    }
}

pub fn farm_summary(summary: &FarmSummary) -> String {
    format!(
        "Quick summary:\n*Sectors*: {}\n*Heads*: {}\n*Pumps*: {}",
        traffic_light(&summary.sectors),
        traffic_light(&summary.heads),
        traffic_light(&summary.pumps)
    )
}

fn traffic_light(light: &TrafficLight) -> String {
    format!("🟢 {} · 🟡 {} · 🔴 {}", light.green, light.yellow, light.red)
}

/// Backslash-escapes the characters legacy Telegram Markdown reads as entity markers.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{escape_markdown, farm_summary, incident, maintenance, submission, trial};
    use crate::domain::reading::{FarmSummary, MaintenanceResult, SubmissionResult, TrafficLight};
    use crate::gateway::GatewayError;
    use crate::uniformity::DerivedStat;

    #[test]
    fn success_line_carries_id_message_and_alerts() {
        let result = SubmissionResult::ok(Some(812))
            .with_message("Lectura guardada")
            .with_alerts(vec!["Presión final baja".to_owned()]);
        let text = submission("Sector reading", &result);

        assert!(text.starts_with("✅ Sector reading recorded successfully. (ID 812)"));
        assert!(text.contains("\nLectura guardada"));
        assert!(text.contains("• Presión final baja"));
    }

    #[test]
    fn failure_line_carries_upstream_detail() {
        let text = submission("Head reading", &SubmissionResult::rejected("cabezal desconocido"));
        assert!(text.starts_with("❌"));
        assert!(text.contains("Detail: cabezal desconocido"));
        assert!(!text.contains("(ID"));
    }

    #[test]
    fn trial_text_keeps_figures_on_transport_failure() {
        let stat = DerivedStat::compute(&[100.0, 110.0]).expect("stat");
        let text = trial(&stat, &Err(GatewayError::Transport("connection refused".to_owned())));
        assert!(text.contains("connection refused"));
        assert!(text.contains("Mean flow (mL/5min): *105.0*"));
        assert!(text.contains("Interpretation: *Very good*"));
    }

    /// Counts entity markers not preceded by a backslash.
    fn unescaped(text: &str, marker: char) -> usize {
        let chars: Vec<char> = text.chars().collect();
        (0..chars.len())
            .filter(|&i| chars[i] == marker && (i == 0 || chars[i - 1] != '\\'))
            .count()
    }

    #[test]
    fn markdown_markers_are_escaped() {
        assert_eq!(escape_markdown("p_final *bajo* [`x`]"), "p\\_final \\*bajo\\* \\[\\`x\\`]");
        assert_eq!(escape_markdown("Presión 1,0 bar"), "Presión 1,0 bar");
    }

    #[test]
    fn upstream_alert_text_cannot_break_formatting() {
        let result = SubmissionResult::ok(Some(5))
            .with_message("guardado en lectura_sector")
            .with_alerts(vec!["p_final por debajo de 1.0 bar".to_owned()]);
        let text = submission("Sector reading", &result);

        assert!(text.contains("• p\\_final por debajo de 1.0 bar"));
        assert_eq!(unescaped(&text, '_'), 0);
        assert_eq!(unescaped(&text, '*') % 2, 0);
    }

    #[test]
    fn trial_figures_survive_awkward_upstream_detail() {
        let stat = DerivedStat::compute(&[100.0, 110.0]).expect("stat");
        let rejected = SubmissionResult::rejected("columna cv_goteros desconocida");
        let text = trial(&stat, &Ok(rejected));

        assert!(text.contains("cv\\_goteros"));
        assert!(text.contains("Interpretation: *Very good*"));
        assert_eq!(unescaped(&text, '_'), 0);
    }

    #[test]
    fn maintenance_rejection_is_escaped() {
        let text = maintenance(&Ok(MaintenanceResult::rejected("alerta_id inválido")));
        assert!(text.ends_with("alerta\\_id inválido"));
    }

    #[test]
    fn incident_success_uses_upstream_message() {
        let result = SubmissionResult::ok(Some(9)).with_message("Incidencia registrada");
        assert_eq!(incident(&Ok(result)), "✅ Incidencia registrada (ID 9)");
    }

    #[test]
    fn summary_lists_every_traffic_light() {
        let summary = FarmSummary {
            sectors: TrafficLight { green: 5, yellow: 1, red: 0 },
            heads: TrafficLight { green: 2, yellow: 0, red: 1 },
            pumps: TrafficLight::default(),
        };
        let text = farm_summary(&summary);
        assert!(text.contains("*Sectors*: 🟢 5 · 🟡 1 · 🔴 0"));
        assert!(text.contains("*Heads*: 🟢 2 · 🟡 0 · 🔴 1"));
        assert!(text.contains("*Pumps*: 🟢 0 · 🟡 0 · 🔴 0"));
    }
}
