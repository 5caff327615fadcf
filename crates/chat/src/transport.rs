use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use riego_core::gateway::ExternalGateway;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{ChatEvent, ChatUpdate, OutboundMessage};
use crate::router::SessionRouter;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("chat transport failed to connect: {0}")]
    Connect(String),
    #[error("chat transport poll failed: {0}")]
    Receive(String),
    #[error("chat transport send failed: {0}")]
    Send(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 500, max_delay_ms: 30_000 }
    }
}

impl ReconnectPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let multiplier = 1_u64 << attempt.min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms))
    }
}

/// Connection to a chat platform: a pull-based update stream plus outbound sends.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;

    /// Next batch of updates; `None` once the stream is closed for good.
    async fn next_updates(&self) -> Result<Option<Vec<ChatUpdate>>, TransportError>;

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Dry-run transport: no updates ever arrive and sends are only logged.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTransport;

#[async_trait]
impl ChatTransport for NoopTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_updates(&self) -> Result<Option<Vec<ChatUpdate>>, TransportError> {
        Ok(None)
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        debug!(
            event_name = "egress.chat.noop_send",
            chat_id = message.chat_id,
            chars = message.text.chars().count(),
            "dropping outbound message"
        );
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Pulls updates from a transport and hands text messages to the session router.
///
/// Transport failures reconnect with exponential backoff. The attempt counter
/// resets once a poll succeeds, so only consecutive failures count against
/// `max_retries`.
pub struct PollingRunner<G> {
    transport: Arc<dyn ChatTransport>,
    router: SessionRouter<G>,
    reconnect_policy: ReconnectPolicy,
}

impl<G> PollingRunner<G>
where
    G: ExternalGateway + 'static,
{
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        router: SessionRouter<G>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, router, reconnect_policy }
    }

    pub fn router(&self) -> &SessionRouter<G> {
        &self.router
    }

    /// Runs until the update stream closes, or fails with the last transport
    /// error once retries are exhausted.
    pub async fn start(&self) -> Result<(), TransportError> {
        let mut attempt = 0_u32;
        loop {
            let mut polled = false;
            let Err(error) = self.connect_and_pump(attempt, &mut polled).await else {
                return Ok(());
            };
            if polled {
                attempt = 0;
            }

            warn!(
                event_name = "ingress.chat.transport_failed",
                attempt,
                max_retries = self.reconnect_policy.max_retries,
                error = %error,
                "chat transport failed"
            );

            if attempt >= self.reconnect_policy.max_retries {
                warn!(
                    event_name = "ingress.chat.retries_exhausted",
                    max_retries = self.reconnect_policy.max_retries,
                    "giving up on the chat transport"
                );
                return Err(error);
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        polled: &mut bool,
    ) -> Result<(), TransportError> {
        info!(attempt, "connecting chat transport");
        self.transport.connect().await?;
        info!(attempt, "chat transport connected");

        loop {
            let Some(updates) = self.transport.next_updates().await? else {
                info!(attempt, "chat update stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            *polled = true;

            for update in updates {
                self.ingest(update);
            }
        }
    }

    fn ingest(&self, update: ChatUpdate) {
        let correlation_id = update.correlation_id();
        info!(
            event_name = "ingress.chat.update_received",
            correlation_id = %correlation_id,
            user_id = %update.user_id,
            chat_id = update.chat_id,
            kind = update.event.kind(),
            "received chat update"
        );

        if let ChatEvent::Unsupported { kind } = &update.event {
            debug!(
                event_name = "ingress.chat.update_ignored",
                correlation_id = %correlation_id,
                kind = %kind,
                "ignoring non-text update"
            );
            return;
        }

        self.router.route(update);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use riego_core::domain::reading::UserId;
    use riego_core::flows::menu;
    use riego_core::flows::{ConversationEngine, EngineSettings};
    use riego_core::gateway::ScriptedGateway;

    use super::{ChatTransport, PollingRunner, ReconnectPolicy, TransportError};
    use crate::events::{ChatEvent, ChatUpdate};
    use crate::router::SessionRouter;
    use crate::testing::{wait_for_sent, ScriptedTransport};

    fn runner(
        transport: Arc<ScriptedTransport>,
        max_retries: u32,
    ) -> PollingRunner<ScriptedGateway> {
        let engine = Arc::new(ConversationEngine::new(
            ScriptedGateway::default(),
            EngineSettings::default(),
        ));
        let outbound: Arc<dyn ChatTransport> = transport.clone();
        let router = SessionRouter::new(engine, outbound.clone(), Duration::from_secs(60));
        PollingRunner::new(
            outbound,
            router,
            ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 },
        )
    }

    fn text(update_id: i64, user: &str, body: &str) -> ChatUpdate {
        ChatUpdate::text(update_id, 10, UserId(user.to_owned()), body)
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = ReconnectPolicy { max_retries: 5, base_delay_ms: 100, max_delay_ms: 1_000 };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(9), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn routes_text_updates_and_skips_the_rest() {
        let transport = Arc::new(ScriptedTransport::with_polls(vec![Ok(Some(vec![
            text(1, "10", "/start"),
            ChatUpdate {
                update_id: 2,
                chat_id: 10,
                user_id: UserId("10".to_owned()),
                event: ChatEvent::Unsupported { kind: "photo".to_owned() },
            },
        ]))]));
        let runner = runner(transport.clone(), 0);

        assert_eq!(runner.start().await, Ok(()));

        let sent = wait_for_sent(&transport, 1).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, menu::GREETING);
        assert_eq!(transport.disconnects(), 1);
    }

    #[tokio::test]
    async fn reconnects_after_a_failed_poll() {
        let transport = Arc::new(ScriptedTransport::with_polls(vec![
            Err(TransportError::Receive("connection reset".to_owned())),
            Ok(Some(vec![text(3, "11", "Help")])),
        ]));
        let runner = runner(transport.clone(), 2);

        assert_eq!(runner.start().await, Ok(()));
        assert_eq!(transport.connects(), 2);
        let sent = wait_for_sent(&transport, 1).await;
        assert_eq!(sent[0].text, menu::HELP_TEXT);
    }

    #[tokio::test]
    async fn gives_up_after_consecutive_failures() {
        let failure = || Err(TransportError::Receive("bad gateway".to_owned()));
        let transport =
            Arc::new(ScriptedTransport::with_polls(vec![failure(), failure(), failure()]));
        let runner = runner(transport.clone(), 2);

        assert_eq!(runner.start().await, Err(TransportError::Receive("bad gateway".to_owned())));
        assert_eq!(transport.connects(), 3);
    }
}
