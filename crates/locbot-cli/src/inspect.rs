//! Offline commands that read the local database.

use chrono::{NaiveDate, Utc};

use locbot_config::LocBotConfig;
use locbot_report::{ReportSpan, build_report, render_report, report_heading};
use locbot_storage::LocBotStorage;

use crate::run::open_storage;

/// Render the report for `group_id` over `start`–`end` on `date`.
pub async fn report(
    config: &LocBotConfig,
    group_id: i64,
    start: &str,
    end: &str,
    date: Option<NaiveDate>,
) -> anyhow::Result<String> {
    let span = ReportSpan::window(start, end)?;
    let storage = open_storage(config)?;
    report_from(&storage, config, group_id, &span, date).await
}

async fn report_from(
    storage: &LocBotStorage,
    config: &LocBotConfig,
    group_id: i64,
    span: &ReportSpan,
    date: Option<NaiveDate>,
) -> anyhow::Result<String> {
    let date =
        date.unwrap_or_else(|| Utc::now().with_timezone(&config.timezone).date_naive());
    let interval = span.resolve(date, &config.timezone)?;
    let lines = build_report(storage, group_id, &interval).await?;
    Ok(render_report(&report_heading(span, date), &lines))
}

/// One `id<TAB>title` line per registered group.
pub async fn groups(config: &LocBotConfig) -> anyhow::Result<Vec<String>> {
    let storage = open_storage(config)?;
    Ok(storage
        .list_groups()
        .await?
        .into_iter()
        .map(|g| format!("{}\t{}", g.group_id, g.title))
        .collect())
}
