//! Telegram platform for locbot.
//!
//! Uses the Telegram Bot API with long-polling (no webhook required).
//! [`TelegramPlatform`] implements the gateway's [`Messenger`] and
//! [`RoleLookup`] and feeds [`InboundEvent`]s into the bot loop.

pub mod api;
pub mod polling;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use locbot_gateway::channel::{Messenger, RoleLookup};
use locbot_types::{ChatRole, InboundEvent, KeyboardButton};

use api::TelegramApi;
use types::{
    AnswerCallbackQueryParams, BotCommand, EditMessageTextParams, GetChatMemberParams,
    SendMessageParams, SetMyCommandsParams,
};

/// Commands shown in the Telegram menu.
pub const BOT_COMMANDS: [(&str, &str); 4] = [
    ("start", "Show help"),
    ("setgroup", "Register this group for scheduled reports"),
    ("report", "Report for a time window, e.g. /report 08:00 09:30"),
    ("allow", "Choose whose check-ins count"),
];

/// Headroom on top of the long-poll timeout for a single HTTP request.
const REQUEST_SLACK: Duration = Duration::from_secs(15);

/// Telegram implementation of the gateway collaborators.
#[derive(Clone)]
pub struct TelegramPlatform {
    api: Arc<TelegramApi>,
    poll_timeout_secs: u64,
}

impl TelegramPlatform {
    pub fn new(bot_token: &str, poll_timeout_secs: u64) -> anyhow::Result<Self> {
        let request_timeout = Duration::from_secs(poll_timeout_secs) + REQUEST_SLACK;
        Ok(Self {
            api: Arc::new(TelegramApi::new(bot_token, request_timeout)?),
            poll_timeout_secs,
        })
    }

    /// Verify the token, then register the command menu (best effort).
    ///
    /// Returns the bot's username, if it has one.
    pub async fn connect(&self) -> anyhow::Result<Option<String>> {
        let bot = self
            .api
            .get_me()
            .await
            .context("Failed to authenticate Telegram bot")?;
        info!(
            bot_id = bot.id,
            bot_username = bot.username.as_deref().unwrap_or(&bot.first_name),
            "Telegram bot authenticated"
        );

        let commands = BOT_COMMANDS
            .iter()
            .map(|(command, description)| BotCommand {
                command: command.to_string(),
                description: description.to_string(),
            })
            .collect();
        if let Err(e) = self
            .api
            .set_my_commands(&SetMyCommandsParams { commands })
            .await
        {
            warn!("Failed to register bot commands: {e:#}");
        }
        Ok(bot.username)
    }

    /// Start long-polling in the background.
    pub fn spawn_polling(
        &self,
        sender: mpsc::Sender<InboundEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let api = self.api.clone();
        let poll_timeout_secs = self.poll_timeout_secs;
        tokio::spawn(async move {
            polling::run_polling_loop(&api, poll_timeout_secs, sender, cancel).await;
        })
    }
}

#[async_trait::async_trait]
impl Messenger for TelegramPlatform {
    async fn send_text(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        self.api
            .send_message(&SendMessageParams {
                chat_id,
                text: text.to_string(),
                reply_markup: None,
            })
            .await?;
        Ok(())
    }

    async fn send_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Vec<Vec<KeyboardButton>>,
    ) -> anyhow::Result<()> {
        self.api
            .send_message(&SendMessageParams {
                chat_id,
                text: text.to_string(),
                reply_markup: Some(keyboard.into()),
            })
            .await?;
        Ok(())
    }

    async fn edit_keyboard(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Vec<Vec<KeyboardButton>>,
    ) -> anyhow::Result<()> {
        self.api
            .edit_message_text(&EditMessageTextParams {
                chat_id,
                message_id,
                text: text.to_string(),
                reply_markup: Some(keyboard.into()),
            })
            .await
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> anyhow::Result<()> {
        self.api
            .answer_callback_query(&AnswerCallbackQueryParams {
                callback_query_id: callback_id.to_string(),
                text: text.map(String::from),
                show_alert,
            })
            .await
    }
}

#[async_trait::async_trait]
impl RoleLookup for TelegramPlatform {
    async fn get_role(&self, chat_id: i64, member_id: i64) -> anyhow::Result<ChatRole> {
        let member = self
            .api
            .get_chat_member(&GetChatMemberParams {
                chat_id,
                user_id: member_id,
            })
            .await?;
        Ok(member.role())
    }
}
