//! locbot-gateway: the bot's behaviour, independent of the chat platform.
//!
//! Provides:
//! - collaborator traits the platform layer implements ([`channel`])
//! - the command surface: start, setgroup, report, allow + allow toggles
//! - check-in intake and member registration
//! - fan-out of scheduled report triggers to every registered group

pub mod channel;
pub mod commands;
pub mod handlers;
pub mod reports;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use chrono_tz::Tz;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use locbot_config::LocBotConfig;
use locbot_cron::scheduler::{Clock, ReportScheduler, SystemClock};
use locbot_cron::{ReportDefinition, ReportTrigger};
use locbot_report::ReportError;
use locbot_storage::{LocBotStorage, StorageError};
use locbot_types::InboundEvent;

use channel::{Messenger, RoleLookup};

pub use reports::TriggerSummary;

/// Usage line shown for a malformed `/report`.
pub const REPORT_USAGE: &str = "Format: /report 08:00 09:30";

/// Failure of a user-issued command. The Display text is sent back to the
/// caller verbatim.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("❌ Only group admins and the owner can use this command.")]
    PermissionDenied,
    #[error("This command only works in groups.")]
    NotAGroup,
    #[error("❌ {0}")]
    Usage(String),
    #[error("⚠️ Could not verify your permissions, try again later.")]
    RoleLookup(String),
    #[error("⚠️ Storage unavailable, try again later.")]
    Storage(#[from] StorageError),
    #[error("⚠️ Could not build the report: {0}")]
    Report(ReportError),
}

impl From<ReportError> for CommandError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::InvalidTimeFormat(value) => {
                CommandError::Usage(format!("Invalid time `{value}`. {REPORT_USAGE}"))
            }
            ReportError::Storage(e) => CommandError::Storage(e),
            other => CommandError::Report(other),
        }
    }
}

/// The bot: storage plus platform collaborators.
pub struct LocBot {
    storage: LocBotStorage,
    messenger: Arc<dyn Messenger>,
    roles: Arc<dyn RoleLookup>,
    zone: Tz,
    delivery_timeout: Duration,
    clock: Arc<dyn Clock>,
    /// Own username; commands addressed to other bots are ignored.
    bot_username: Option<String>,
}

impl LocBot {
    pub fn new(
        config: &LocBotConfig,
        storage: LocBotStorage,
        messenger: Arc<dyn Messenger>,
        roles: Arc<dyn RoleLookup>,
    ) -> Self {
        Self {
            storage,
            messenger,
            roles,
            zone: config.timezone,
            delivery_timeout: config.delivery_timeout(),
            clock: Arc::new(SystemClock),
            bot_username: None,
        }
    }

    /// Replace the wall clock (tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Only accept `/cmd@name` suffixes naming this bot.
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    pub fn storage(&self) -> &LocBotStorage {
        &self.storage
    }

    /// Today's date in the report timezone.
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.zone).date_naive()
    }

    /// Run until `cancel` fires: consume platform events and scheduled
    /// report triggers. Each event and each trigger runs in its own task.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<InboundEvent>,
        definitions: Vec<ReportDefinition>,
        cancel: CancellationToken,
    ) {
        let (trigger_tx, mut trigger_rx) = mpsc::unbounded_channel::<ReportTrigger>();
        let scheduler = Arc::new(ReportScheduler::with_clock(
            definitions,
            self.zone,
            self.clock.clone(),
        ));
        let scheduler_cancel = cancel.child_token();
        let scheduler_handle =
            tokio::spawn(scheduler.run_scheduler(trigger_tx, scheduler_cancel.clone()));

        info!("Bot loop started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("Inbound channel closed, stopping bot loop");
                        break;
                    };
                    let bot = self.clone();
                    tokio::spawn(async move { bot.handle_event(event).await });
                }
                Some(trigger) = trigger_rx.recv() => {
                    let bot = self.clone();
                    tokio::spawn(async move { bot.run_trigger(&trigger).await });
                }
            }
        }

        scheduler_cancel.cancel();
        let _ = scheduler_handle.await;
        info!("Bot loop stopped");
    }
}
