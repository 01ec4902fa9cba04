use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use locbot_channel_telegram::TelegramPlatform;
use locbot_config::LocBotConfig;
use locbot_cron::definitions_from_config;
use locbot_gateway::LocBot;
use locbot_storage::LocBotStorage;

/// Open the configured database, creating its directory when needed.
pub fn open_storage(config: &LocBotConfig) -> anyhow::Result<LocBotStorage> {
    let path = config.database_path()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    LocBotStorage::open(&path).with_context(|| format!("Failed to open {}", path.display()))
}

/// Run the bot until Ctrl-C.
pub async fn run_bot(config: LocBotConfig) -> anyhow::Result<()> {
    config.validate()?;
    let token = config.resolve_bot_token()?;
    let definitions = definitions_from_config(&config)?;
    let storage = open_storage(&config)?;

    let platform = Arc::new(TelegramPlatform::new(&token, config.poll_timeout_secs)?);
    let bot_username = platform.connect().await?;

    let cancel = CancellationToken::new();
    let (event_tx, event_rx) = mpsc::channel(256);
    let poll_handle = platform.spawn_polling(event_tx, cancel.child_token());

    let mut bot = LocBot::new(&config, storage, platform.clone(), platform.clone());
    if let Some(username) = bot_username {
        bot = bot.with_bot_username(username);
    }
    let bot = Arc::new(bot);
    let mut bot_handle = tokio::spawn(bot.run(event_rx, definitions, cancel.clone()));

    info!(
        zone = %config.timezone,
        windows = config.windows.len(),
        "locbot running, press Ctrl-C to stop"
    );

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            info!("Shutting down");
        }
        _ = &mut bot_handle => {
            info!("Bot loop exited");
        }
    }

    cancel.cancel();
    let _ = poll_handle.await;
    if !bot_handle.is_finished() {
        let _ = bot_handle.await;
    }
    Ok(())
}
