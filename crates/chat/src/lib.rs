//! Chat front end for the irrigation bot.
//!
//! - **Transport** (`transport`): the `ChatTransport` trait, a dry-run
//!   `NoopTransport` and the `PollingRunner` reconnect loop
//! - **Telegram** (`telegram`): Bot API long polling and `sendMessage`
//! - **Router** (`router`): one ordered queue and consumer task per user
//! - **Keyboards** (`keyboard`): reply keyboards behind each [`Keyboard`] value
//!
//! ```text
//! getUpdates → PollingRunner → SessionRouter → per-user task → ConversationEngine
//!                                                   ↓
//!                                   sendMessage ← OutboundMessage
//! ```
//!
//! [`Keyboard`]: riego_core::flows::Keyboard

pub mod events;
pub mod keyboard;
pub mod router;
pub mod telegram;
pub mod transport;

#[cfg(test)]
mod testing;

pub use events::{ChatEvent, ChatUpdate, OutboundMessage};
pub use keyboard::{KeyboardLayout, ReplyMarkup};
pub use router::SessionRouter;
pub use telegram::TelegramTransport;
pub use transport::{ChatTransport, NoopTransport, PollingRunner, ReconnectPolicy, TransportError};
