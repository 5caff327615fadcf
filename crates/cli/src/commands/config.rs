use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use riego_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::CommandResult;

/// `(key path, env vars checked in order)`; the first env var is the canonical one.
const FIELDS: [(&str, &[&str]); 16] = [
    ("gateway.base_url", &["RIEGO_GATEWAY_BASE_URL"]),
    ("gateway.site_id", &["RIEGO_GATEWAY_SITE_ID"]),
    ("gateway.timeout_secs", &["RIEGO_GATEWAY_TIMEOUT_SECS"]),
    ("gateway.user_agent", &["RIEGO_GATEWAY_USER_AGENT"]),
    ("gateway.alerts_limit", &["RIEGO_GATEWAY_ALERTS_LIMIT"]),
    ("chat.transport", &["RIEGO_CHAT_TRANSPORT"]),
    ("chat.bot_token", &["RIEGO_CHAT_BOT_TOKEN", "RIEGO_BOT_TOKEN"]),
    ("chat.poll_timeout_secs", &["RIEGO_CHAT_POLL_TIMEOUT_SECS"]),
    ("chat.session_idle_secs", &["RIEGO_CHAT_SESSION_IDLE_SECS"]),
    ("links.panel", &["RIEGO_LINKS_PANEL"]),
    ("links.progress", &["RIEGO_LINKS_PROGRESS"]),
    ("links.docs", &["RIEGO_LINKS_DOCS"]),
    ("server.bind_address", &["RIEGO_SERVER_BIND_ADDRESS"]),
    ("server.health_check_port", &["RIEGO_SERVER_HEALTH_CHECK_PORT"]),
    ("logging.level", &["RIEGO_LOGGING_LEVEL", "RIEGO_LOG_LEVEL"]),
    ("logging.format", &["RIEGO_LOGGING_FORMAT", "RIEGO_LOG_FORMAT"]),
];

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("config", "config_validation", error.to_string(), 2);
        }
    };
    CommandResult::text(render(&config))
}

pub fn render(config: &AppConfig) -> String {
    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let file_label = config_file_path.as_deref().map(|path| path.display().to_string());
    lines.push(format!("- config file = {}", file_label.as_deref().unwrap_or("<none>")));

    for (key, env_keys) in FIELDS {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &field_value(config, key), source));
    }

    lines.join("\n")
}

fn field_value(config: &AppConfig, key: &str) -> String {
    match key {
        "gateway.base_url" => config.gateway.base_url.clone(),
        "gateway.site_id" => config.gateway.site_id.clone(),
        "gateway.timeout_secs" => config.gateway.timeout_secs.to_string(),
        "gateway.user_agent" => config.gateway.user_agent.clone(),
        "gateway.alerts_limit" => config.gateway.alerts_limit.to_string(),
        "chat.transport" => config.chat.transport.as_str().to_string(),
        "chat.bot_token" => redact_token(config.chat.bot_token.expose_secret()),
        "chat.poll_timeout_secs" => config.chat.poll_timeout_secs.to_string(),
        "chat.session_idle_secs" => config.chat.session_idle_secs.to_string(),
        "links.panel" => or_unset(&config.links.panel),
        "links.progress" => or_unset(&config.links.progress),
        "links.docs" => or_unset(&config.links.docs),
        "server.bind_address" => config.server.bind_address.clone(),
        "server.health_check_port" => config.server.health_check_port.to_string(),
        "logging.level" => config.logging.level.clone(),
        "logging.format" => config.logging.format.as_str().to_string(),
        _ => "<unknown>".to_string(),
    }
}

fn or_unset(value: &str) -> String {
    if value.is_empty() {
        "<unset>".to_string()
    } else {
        value.to_string()
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the bot id, which is public, and hides the secret half.
pub fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_token};

    #[test]
    fn token_redaction_keeps_only_the_bot_id() {
        assert_eq!(redact_token("123456:AAE-secret"), "123456:***");
        assert_eq!(redact_token("  "), "<empty>");
        assert_eq!(redact_token("opaque"), "<redacted>");
    }

    #[test]
    fn nested_keys_are_found_in_the_file() {
        let doc: toml::Value = match "[gateway]\nsite_id = \"4\"\n".parse() {
            Ok(doc) => doc,
            Err(error) => panic!("fixture should parse: {error}"),
        };
        assert!(contains_path(&doc, "gateway.site_id"));
        assert!(!contains_path(&doc, "gateway.base_url"));
    }
}
