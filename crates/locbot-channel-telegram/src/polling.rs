//! Telegram long-polling loop.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use locbot_types::{CallbackPress, ChatRef, InboundEvent, InboundMessage, Location, Sender};

use crate::api::TelegramApi;
use crate::types::{Chat, GetUpdatesParams, TgMessage, Update, User};

fn to_chat_ref(chat: &Chat) -> ChatRef {
    ChatRef {
        id: chat.id,
        kind: chat.kind(),
        title: chat.title.clone(),
    }
}

fn to_sender(user: &User) -> Sender {
    Sender {
        id: user.id,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    }
}

fn to_message(msg: TgMessage) -> Option<InboundMessage> {
    // channel posts carry no sender
    let from = msg.from.as_ref()?;
    if from.is_bot {
        return None;
    }
    Some(InboundMessage {
        chat: to_chat_ref(&msg.chat),
        sender: to_sender(from),
        message_id: msg.message_id,
        text: msg.text,
        location: msg.location.map(|l| Location {
            latitude: l.latitude,
            longitude: l.longitude,
        }),
        timestamp: DateTime::from_timestamp(msg.date, 0).unwrap_or_else(Utc::now),
    })
}

/// Convert an update into a gateway event; `None` for updates the bot ignores.
pub fn to_event(update: Update) -> Option<InboundEvent> {
    if let Some(query) = update.callback_query {
        let message = query.message?;
        return Some(InboundEvent::Callback(CallbackPress {
            callback_id: query.id,
            chat: to_chat_ref(&message.chat),
            sender: to_sender(&query.from),
            message_id: message.message_id,
            data: query.data.unwrap_or_default(),
        }));
    }
    update.message.and_then(to_message).map(InboundEvent::Message)
}

/// Run the long-polling loop, forwarding updates as [`InboundEvent`]s.
///
/// Exits when `cancel` is cancelled or the `sender` is closed.
pub async fn run_polling_loop(
    api: &TelegramApi,
    poll_timeout_secs: u64,
    sender: mpsc::Sender<InboundEvent>,
    cancel: CancellationToken,
) {
    let mut offset: Option<i64> = None;
    let mut backoff = Duration::from_secs(1);
    let max_backoff = Duration::from_secs(30);

    info!("Telegram polling loop started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let params = GetUpdatesParams {
            offset,
            timeout: Some(poll_timeout_secs),
            allowed_updates: Some(vec!["message".into(), "callback_query".into()]),
        };

        let updates = tokio::select! {
            _ = cancel.cancelled() => break,
            result = api.get_updates(&params) => result,
        };

        match updates {
            Ok(updates) => {
                backoff = Duration::from_secs(1);

                for update in updates {
                    offset = Some(update.update_id + 1);
                    let update_id = update.update_id;

                    let Some(event) = to_event(update) else {
                        continue;
                    };

                    debug!(update_id, "Forwarding Telegram update");

                    if sender.send(event).await.is_err() {
                        info!("Inbound channel closed, stopping polling");
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(backoff_secs = backoff.as_secs(), "getUpdates error: {e:#}");

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {},
                }

                backoff = (backoff * 2).min(max_backoff);
            }
        }
    }

    info!("Telegram polling loop stopped");
}
