use std::sync::Arc;
use std::time::Duration;

use riego_api::HttpGateway;
use riego_chat::{
    ChatTransport, NoopTransport, PollingRunner, ReconnectPolicy, SessionRouter, TelegramTransport,
    TransportError,
};
use riego_core::audit::TracingAuditSink;
use riego_core::config::{AppConfig, ChatTransportKind, ConfigError, LoadOptions};
use riego_core::flows::{ConversationEngine, EngineSettings, Links};
use riego_core::gateway::GatewayError;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    /// Shared with the health endpoint; the engine owns its own clone.
    pub gateway: HttpGateway,
    pub runner: PollingRunner<HttpGateway>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("gateway client setup failed: {0}")]
    Gateway(#[source] GatewayError),
    #[error("chat transport setup failed: {0}")]
    Transport(#[source] TransportError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        transport = config.chat.transport.as_str(),
        "starting application bootstrap"
    );

    let gateway = HttpGateway::new(&config.gateway).map_err(BootstrapError::Gateway)?;
    info!(
        event_name = "system.bootstrap.gateway_ready",
        correlation_id = "bootstrap",
        base_url = %gateway.base_url(),
        site_id = %config.gateway.site_id,
        timeout_secs = config.gateway.timeout_secs,
        "record-keeping gateway configured"
    );

    let engine = ConversationEngine::new(gateway.clone(), engine_settings(&config))
        .with_audit_sink(Arc::new(TracingAuditSink));

    let transport: Arc<dyn ChatTransport> = match config.chat.transport {
        ChatTransportKind::Telegram => {
            Arc::new(TelegramTransport::new(&config.chat).map_err(BootstrapError::Transport)?)
        }
        ChatTransportKind::Noop => Arc::new(NoopTransport),
    };

    let router = SessionRouter::new(
        Arc::new(engine),
        Arc::clone(&transport),
        Duration::from_secs(config.chat.session_idle_secs),
    );
    let runner = PollingRunner::new(transport, router, ReconnectPolicy::default());

    Ok(Application { config, gateway, runner })
}

fn engine_settings(config: &AppConfig) -> EngineSettings {
    EngineSettings {
        alerts_limit: config.gateway.alerts_limit,
        links: Links {
            panel: config.links.panel.clone(),
            progress: config.links.progress.clone(),
            docs: config.links.docs.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use riego_core::config::{ChatTransportKind, ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap, engine_settings};

    fn overrides(transport: ChatTransportKind, token: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                gateway_base_url: Some("https://riego.example.test/api".to_owned()),
                chat_transport: Some(transport),
                chat_bot_token: Some(token.to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn bootstrap_fails_fast_on_malformed_bot_token() {
        let result = bootstrap(overrides(ChatTransportKind::Telegram, "not-a-token"));
        let message = match result {
            Ok(_) => panic!("bootstrap should reject the token"),
            Err(error) => error.to_string(),
        };
        assert!(message.contains("chat.bot_token"), "{message}");
    }

    #[tokio::test]
    async fn noop_transport_bootstraps_without_token() {
        let app = match bootstrap(overrides(ChatTransportKind::Noop, "")) {
            Ok(app) => app,
            Err(error) => panic!("noop bootstrap should succeed: {error}"),
        };

        assert_eq!(app.gateway.base_url(), "https://riego.example.test/api");
        assert_eq!(engine_settings(&app.config).alerts_limit, app.config.gateway.alerts_limit);
        assert_eq!(app.runner.start().await, Ok(()));
        assert_eq!(app.runner.router().active_sessions(), 0);
    }
}
