//! Per-user serialisation of inbound messages.
//!
//! Every active user has one unbounded queue drained by one spawned task,
//! and that task owns the user's [`Session`]. Messages of one user are
//! therefore handled strictly in order, each transition finishing (outbound
//! gateway call and replies included) before the next one starts. Distinct
//! users never share state and run concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use riego_core::domain::reading::UserId;
use riego_core::flows::ConversationEngine;
use riego_core::gateway::ExternalGateway;
use riego_core::session::Session;
use tokio::sync::mpsc::{self, error::SendError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::events::{ChatEvent, ChatUpdate, OutboundMessage};
use crate::transport::ChatTransport;

type Workers = Arc<Mutex<HashMap<UserId, UnboundedSender<ChatUpdate>>>>;

pub struct SessionRouter<G> {
    engine: Arc<ConversationEngine<G>>,
    outbound: Arc<dyn ChatTransport>,
    idle_timeout: Duration,
    workers: Workers,
}

impl<G> Clone for SessionRouter<G> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            outbound: Arc::clone(&self.outbound),
            idle_timeout: self.idle_timeout,
            workers: Arc::clone(&self.workers),
        }
    }
}

impl<G> SessionRouter<G>
where
    G: ExternalGateway + 'static,
{
    pub fn new(
        engine: Arc<ConversationEngine<G>>,
        outbound: Arc<dyn ChatTransport>,
        idle_timeout: Duration,
    ) -> Self {
        Self { engine, outbound, idle_timeout, workers: Arc::default() }
    }

    /// Queues an update behind any earlier ones from the same user, starting
    /// a consumer with a fresh session when the user has none.
    ///
    /// Must be called from within a tokio runtime.
    pub fn route(&self, update: ChatUpdate) {
        let mut workers = lock(&self.workers);
        let user_id = update.user_id.clone();

        let update = match workers.get(&user_id) {
            Some(sender) => match sender.send(update) {
                Ok(()) => return,
                Err(SendError(update)) => update,
            },
            None => update,
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        // The receiver is alive until `run_worker` starts, so this cannot fail.
        let _ = sender.send(update);
        workers.insert(user_id.clone(), sender);
        drop(workers);

        info!(event_name = "chat.session.opened", user_id = %user_id, "session opened");
        tokio::spawn(run_worker(
            Arc::clone(&self.engine),
            Arc::clone(&self.outbound),
            Arc::clone(&self.workers),
            user_id,
            receiver,
            self.idle_timeout,
        ));
    }

    /// Users whose consumer task is still alive.
    pub fn active_sessions(&self) -> usize {
        lock(&self.workers).values().filter(|sender| !sender.is_closed()).count()
    }
}

fn lock(workers: &Workers) -> MutexGuard<'_, HashMap<UserId, UnboundedSender<ChatUpdate>>> {
    match workers.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

async fn run_worker<G>(
    engine: Arc<ConversationEngine<G>>,
    outbound: Arc<dyn ChatTransport>,
    workers: Workers,
    user_id: UserId,
    mut receiver: UnboundedReceiver<ChatUpdate>,
    idle_timeout: Duration,
) where
    G: ExternalGateway,
{
    let mut session = Session::new(user_id.clone());

    loop {
        let update = match tokio::time::timeout(idle_timeout, receiver.recv()).await {
            Ok(Some(update)) => update,
            Ok(None) => break,
            Err(_elapsed) => {
                // `route` sends under this lock, so an empty queue here stays empty.
                let mut registered = lock(&workers);
                match receiver.try_recv() {
                    Ok(update) => update,
                    Err(_) => {
                        registered.remove(&user_id);
                        info!(
                            event_name = "chat.session.expired",
                            user_id = %user_id,
                            step = session.state.step_name(),
                            idle_secs = idle_timeout.as_secs(),
                            "idle session dropped"
                        );
                        return;
                    }
                }
            }
        };

        handle_update(&engine, outbound.as_ref(), &mut session, update).await;
    }

    debug!(event_name = "chat.session.closed", user_id = %user_id, "session queue closed");
}

async fn handle_update<G>(
    engine: &ConversationEngine<G>,
    outbound: &dyn ChatTransport,
    session: &mut Session,
    update: ChatUpdate,
) where
    G: ExternalGateway,
{
    let correlation_id = update.correlation_id();
    let ChatEvent::Text(text) = &update.event else {
        return;
    };

    let outcome = engine.handle(session, text, &correlation_id).await;

    for reply in &outcome.replies {
        let message = OutboundMessage::from_reply(update.chat_id, reply);
        if let Err(error) = outbound.send(&message).await {
            warn!(
                event_name = "egress.chat.send_failed",
                correlation_id = %correlation_id,
                user_id = %update.user_id,
                chat_id = update.chat_id,
                error = %error,
                "reply could not be delivered"
            );
        }
    }
}
