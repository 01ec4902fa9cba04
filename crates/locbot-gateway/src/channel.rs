//! Collaborator traits implemented by the chat platform layer.
//!
//! ```text
//! Platform (Telegram, ...)
//!     ↓ InboundEvent via mpsc
//! LocBot::handle_event ── storage / reports
//!     ↓
//! Messenger::send_text / send_keyboard / edit_keyboard / answer_callback
//! ```
//!
//! # Implementing a platform
//!
//! ```rust,ignore
//! use locbot_gateway::channel::{Messenger, RoleLookup};
//!
//! struct MyPlatform { /* ... */ }
//!
//! #[async_trait::async_trait]
//! impl Messenger for MyPlatform {
//!     async fn send_text(&self, chat_id: i64, text: &str) -> anyhow::Result<()> { /* ... */ }
//!     // ...
//! }
//! ```

use locbot_types::{ChatRole, KeyboardButton};

/// Outbound side of the chat platform.
///
/// Implementations must not retry; a failed call is logged and skipped by
/// the caller.
#[async_trait::async_trait]
pub trait Messenger: Send + Sync {
    /// Send a plain text message to a chat.
    async fn send_text(&self, chat_id: i64, text: &str) -> anyhow::Result<()>;

    /// Send a message with an inline keyboard (one `Vec` per row).
    async fn send_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Vec<Vec<KeyboardButton>>,
    ) -> anyhow::Result<()>;

    /// Replace text and keyboard of a message sent earlier.
    async fn edit_keyboard(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Vec<Vec<KeyboardButton>>,
    ) -> anyhow::Result<()>;

    /// Acknowledge a keyboard press, optionally with a popup alert.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> anyhow::Result<()>;
}

/// Admin-check side of the chat platform.
#[async_trait::async_trait]
pub trait RoleLookup: Send + Sync {
    /// Role of `member_id` inside `chat_id`.
    async fn get_role(&self, chat_id: i64, member_id: i64) -> anyhow::Result<ChatRole>;
}
