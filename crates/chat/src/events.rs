use riego_core::domain::reading::UserId;
use riego_core::flows::Reply;

use crate::keyboard::ReplyMarkup;

/// One inbound update from the chat platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatUpdate {
    pub update_id: i64,
    pub chat_id: i64,
    pub user_id: UserId,
    pub event: ChatEvent,
}

impl ChatUpdate {
    pub fn text(update_id: i64, chat_id: i64, user_id: UserId, text: impl Into<String>) -> Self {
        Self { update_id, chat_id, user_id, event: ChatEvent::Text(text.into()) }
    }

    pub fn correlation_id(&self) -> String {
        format!("upd-{}", self.update_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    Text(String),
    Unsupported { kind: String },
}

impl ChatEvent {
    pub fn kind(&self) -> &str {
        match self {
            Self::Text(_) => "text",
            Self::Unsupported { kind } => kind,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: i64,
    pub text: String,
    pub markdown: bool,
    pub markup: ReplyMarkup,
}

impl OutboundMessage {
    pub fn from_reply(chat_id: i64, reply: &Reply) -> Self {
        Self {
            chat_id,
            text: reply.text.clone(),
            markdown: reply.markdown,
            markup: ReplyMarkup::from_keyboard(&reply.keyboard),
        }
    }
}
