use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::events::{ChatUpdate, OutboundMessage};
use crate::transport::{ChatTransport, TransportError};

type Poll = Result<Option<Vec<ChatUpdate>>, TransportError>;

/// Replays scripted polls, then reports a closed stream. Records every send.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    polls: Mutex<VecDeque<Poll>>,
    sent: Mutex<Vec<OutboundMessage>>,
    connects: AtomicU32,
    disconnects: AtomicU32,
}

impl ScriptedTransport {
    pub(crate) fn with_polls(polls: Vec<Poll>) -> Self {
        Self { polls: Mutex::new(polls.into()), ..Self::default() }
    }

    pub(crate) async fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    pub(crate) fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn disconnects(&self) -> u32 {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next_updates(&self) -> Result<Option<Vec<ChatUpdate>>, TransportError> {
        self.polls.lock().await.pop_front().unwrap_or(Ok(None))
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.sent.lock().await.push(message.clone());
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Waits up to two seconds for at least `count` sent messages.
pub(crate) async fn wait_for_sent(
    transport: &ScriptedTransport,
    count: usize,
) -> Vec<OutboundMessage> {
    for _ in 0..200 {
        let sent = transport.sent().await;
        if sent.len() >= count {
            return sent;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    transport.sent().await
}
