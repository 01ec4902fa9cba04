//! Per-member check-in counts for a group and interval.

use locbot_storage::{LocBotStorage, ReportInputs};

use crate::interval::Interval;
use crate::{ReportError, Result};

/// One report row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub member_id: i64,
    pub name: String,
    pub count: u64,
}

/// Count check-ins for allowed members only, in first-seen member order.
///
/// Members missing from the allow-list are dropped entirely, so their
/// stored check-ins never show up.
pub fn aggregate(inputs: &ReportInputs) -> Vec<ReportLine> {
    inputs
        .members
        .iter()
        .filter(|m| inputs.allowed.contains(&m.member_id))
        .map(|m| ReportLine {
            member_id: m.member_id,
            name: m.display_name(),
            count: inputs.counts.get(&m.member_id).copied().unwrap_or(0),
        })
        .collect()
}

/// Build the report for `group_id` over `interval`.
///
/// Members, allow-list and counts are read in one storage call so the whole
/// report sees a single allow-list state.
pub async fn build_report(
    storage: &LocBotStorage,
    group_id: i64,
    interval: &Interval,
) -> Result<Vec<ReportLine>> {
    if interval.start > interval.end {
        return Err(ReportError::UnknownInterval {
            start: interval.start,
            end: interval.end,
        });
    }

    let inputs = storage
        .load_report_inputs(group_id, interval.start, interval.end)
        .await?;
    let lines = aggregate(&inputs);
    tracing::debug!(
        group_id,
        members = inputs.members.len(),
        reported = lines.len(),
        "Report built"
    );
    Ok(lines)
}
