use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "riego.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub chat: ChatConfig,
    pub links: LinksConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Connection settings for the record-keeping service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Sent as `finca_id` on every request.
    pub site_id: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub alerts_limit: usize,
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub transport: ChatTransportKind,
    pub bot_token: SecretString,
    pub poll_timeout_secs: u64,
    pub session_idle_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinksConfig {
    pub panel: String,
    pub progress: String,
    pub docs: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatTransportKind {
    Telegram,
    Noop,
}

impl ChatTransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Noop => "noop",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub gateway_base_url: Option<String>,
    pub gateway_site_id: Option<String>,
    pub gateway_timeout_secs: Option<u64>,
    pub chat_transport: Option<ChatTransportKind>,
    pub chat_bot_token: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                base_url: String::new(),
                site_id: "1".to_string(),
                timeout_secs: 10,
                user_agent: format!("riego-bot/{}", env!("CARGO_PKG_VERSION")),
                alerts_limit: 20,
            },
            chat: ChatConfig {
                transport: ChatTransportKind::Telegram,
                bot_token: String::new().into(),
                poll_timeout_secs: 30,
                session_idle_secs: 1800,
            },
            links: LinksConfig {
                panel: String::new(),
                progress: String::new(),
                docs: String::new(),
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for ChatTransportKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram),
            "noop" => Ok(Self::Noop),
            other => Err(ConfigError::Validation(format!(
                "unsupported chat transport `{other}` (expected telegram|noop)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match resolve_config_path(options.config_path.as_deref()) {
            Some(path) => config.apply_patch(read_patch(&path)?),
            None if options.require_file => {
                let expected =
                    options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(gateway) = patch.gateway {
            set(&mut self.gateway.base_url, gateway.base_url);
            set(&mut self.gateway.site_id, gateway.site_id);
            set(&mut self.gateway.timeout_secs, gateway.timeout_secs);
            set(&mut self.gateway.user_agent, gateway.user_agent);
            set(&mut self.gateway.alerts_limit, gateway.alerts_limit);
        }

        if let Some(chat) = patch.chat {
            set(&mut self.chat.transport, chat.transport);
            if let Some(token) = chat.bot_token {
                self.chat.bot_token = secret_value(token);
            }
            set(&mut self.chat.poll_timeout_secs, chat.poll_timeout_secs);
            set(&mut self.chat.session_idle_secs, chat.session_idle_secs);
        }

        if let Some(links) = patch.links {
            set(&mut self.links.panel, links.panel);
            set(&mut self.links.progress, links.progress);
            set(&mut self.links.docs, links.docs);
        }

        if let Some(server) = patch.server {
            set(&mut self.server.bind_address, server.bind_address);
            set(&mut self.server.health_check_port, server.health_check_port);
        }

        if let Some(logging) = patch.logging {
            set(&mut self.logging.level, logging.level);
            set(&mut self.logging.format, logging.format);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("RIEGO_GATEWAY_BASE_URL") {
            self.gateway.base_url = value;
        }
        if let Some(value) = read_env("RIEGO_GATEWAY_SITE_ID") {
            self.gateway.site_id = value;
        }
        if let Some(value) = read_env("RIEGO_GATEWAY_TIMEOUT_SECS") {
            self.gateway.timeout_secs = parse_env("RIEGO_GATEWAY_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("RIEGO_GATEWAY_USER_AGENT") {
            self.gateway.user_agent = value;
        }
        if let Some(value) = read_env("RIEGO_GATEWAY_ALERTS_LIMIT") {
            self.gateway.alerts_limit = parse_env("RIEGO_GATEWAY_ALERTS_LIMIT", &value)?;
        }

        if let Some(value) = read_env("RIEGO_CHAT_TRANSPORT") {
            self.chat.transport = value.parse()?;
        }
        let bot_token = read_env("RIEGO_CHAT_BOT_TOKEN").or_else(|| read_env("RIEGO_BOT_TOKEN"));
        if let Some(value) = bot_token {
            self.chat.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("RIEGO_CHAT_POLL_TIMEOUT_SECS") {
            self.chat.poll_timeout_secs = parse_env("RIEGO_CHAT_POLL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("RIEGO_CHAT_SESSION_IDLE_SECS") {
            self.chat.session_idle_secs = parse_env("RIEGO_CHAT_SESSION_IDLE_SECS", &value)?;
        }

        if let Some(value) = read_env("RIEGO_LINKS_PANEL") {
            self.links.panel = value;
        }
        if let Some(value) = read_env("RIEGO_LINKS_PROGRESS") {
            self.links.progress = value;
        }
        if let Some(value) = read_env("RIEGO_LINKS_DOCS") {
            self.links.docs = value;
        }

        if let Some(value) = read_env("RIEGO_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("RIEGO_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_env("RIEGO_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level = read_env("RIEGO_LOGGING_LEVEL").or_else(|| read_env("RIEGO_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("RIEGO_LOGGING_FORMAT").or_else(|| read_env("RIEGO_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        set(&mut self.gateway.base_url, overrides.gateway_base_url);
        set(&mut self.gateway.site_id, overrides.gateway_site_id);
        set(&mut self.gateway.timeout_secs, overrides.gateway_timeout_secs);
        set(&mut self.chat.transport, overrides.chat_transport);
        if let Some(token) = overrides.chat_bot_token {
            self.chat.bot_token = secret_value(token);
        }
        set(&mut self.logging.level, overrides.log_level);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_gateway(&self.gateway)?;
        validate_chat(&self.chat)?;
        validate_links(&self.links)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Expands `${VAR}` references; a missing variable is an error, not an empty string.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let key = &after[..end];
        let value = env::var(key)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.to_string() })?;
        output.push_str(&value);
        rest = &after[end + 1..];
    }
    output.push_str(rest);

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_gateway(gateway: &GatewayConfig) -> Result<(), ConfigError> {
    let base_url = gateway.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::Validation(
            "gateway.base_url is required (set it in riego.toml or RIEGO_GATEWAY_BASE_URL)"
                .to_string(),
        ));
    }
    if !is_http_url(base_url) {
        return Err(ConfigError::Validation(
            "gateway.base_url must start with http:// or https://".to_string(),
        ));
    }
    if gateway.site_id.trim().is_empty() {
        return Err(ConfigError::Validation("gateway.site_id must not be empty".to_string()));
    }
    if gateway.timeout_secs == 0 || gateway.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "gateway.timeout_secs must be in range 1..=120".to_string(),
        ));
    }
    if gateway.alerts_limit == 0 {
        return Err(ConfigError::Validation(
            "gateway.alerts_limit must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    if chat.session_idle_secs == 0 {
        return Err(ConfigError::Validation(
            "chat.session_idle_secs must be greater than zero".to_string(),
        ));
    }
    if chat.poll_timeout_secs > 50 {
        return Err(ConfigError::Validation(
            "chat.poll_timeout_secs must be at most 50".to_string(),
        ));
    }
    if chat.transport == ChatTransportKind::Noop {
        return Ok(());
    }

    let token = chat.bot_token.expose_secret();
    if token.is_empty() {
        return Err(ConfigError::Validation(
            "chat.bot_token is required for the telegram transport. Get it from @BotFather, \
             or set chat.transport = \"noop\" for a dry run"
                .to_string(),
        ));
    }
    let well_formed = token
        .split_once(':')
        .map(|(bot_id, secret)| {
            !bot_id.is_empty() && bot_id.chars().all(|c| c.is_ascii_digit()) && !secret.is_empty()
        })
        .unwrap_or(false);
    if !well_formed {
        return Err(ConfigError::Validation(
            "chat.bot_token must look like `<bot id>:<secret>` as issued by @BotFather".to_string(),
        ));
    }
    Ok(())
}

fn validate_links(links: &LinksConfig) -> Result<(), ConfigError> {
    let fields = [
        ("links.panel", &links.panel),
        ("links.progress", &links.progress),
        ("links.docs", &links.docs),
    ];
    for (key, value) in fields {
        if !value.is_empty() && !is_http_url(value) {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https://"
            )));
        }
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    gateway: Option<GatewayPatch>,
    chat: Option<ChatPatch>,
    links: Option<LinksPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    base_url: Option<String>,
    site_id: Option<String>,
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
    alerts_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    transport: Option<ChatTransportKind>,
    bot_token: Option<String>,
    poll_timeout_secs: Option<u64>,
    session_idle_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LinksPatch {
    panel: Option<String>,
    progress: Option<String>,
    docs: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
