//! locbot-cron: daily report triggers.
//!
//! A fixed table of report definitions, built once from configuration, and a
//! scheduler loop that emits a [`ReportTrigger`] whenever one of them is due.

pub mod scheduler;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use locbot_config::LocBotConfig;
use locbot_report::{ReportError, ReportSpan};
use locbot_types::parse_hm;

/// A recurring report: which span to report and when to send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDefinition {
    /// Stable label used in logs.
    pub name: String,
    pub span: ReportSpan,
    /// Local time of day the report is delivered.
    pub trigger_at: NaiveTime,
}

/// A definition that just became due.
#[derive(Debug, Clone)]
pub struct ReportTrigger {
    pub definition: ReportDefinition,
    /// Local date the report is resolved against.
    pub local_date: NaiveDate,
    pub fired_at: DateTime<Utc>,
}

/// Build the definition table: every configured window plus the daily summary.
pub fn definitions_from_config(
    config: &LocBotConfig,
) -> Result<Vec<ReportDefinition>, ReportError> {
    let mut definitions = config
        .windows
        .iter()
        .map(|w| {
            Ok(ReportDefinition {
                name: format!("window {}-{}", w.start, w.end),
                span: ReportSpan::window(&w.start, &w.end)?,
                trigger_at: parse_trigger(&w.trigger_at)?,
            })
        })
        .collect::<Result<Vec<_>, ReportError>>()?;

    definitions.push(ReportDefinition {
        name: "daily summary".to_string(),
        span: ReportSpan::FullDay,
        trigger_at: parse_trigger(&config.daily_summary_at)?,
    });
    Ok(definitions)
}

fn parse_trigger(input: &str) -> Result<NaiveTime, ReportError> {
    parse_hm(input).ok_or_else(|| ReportError::InvalidTimeFormat(input.to_string()))
}
