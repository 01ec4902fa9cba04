//! Report composition and delivery, on demand and for scheduled triggers.

use std::sync::Arc;

use anyhow::bail;
use chrono::NaiveDate;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use locbot_cron::ReportTrigger;
use locbot_report::{ReportError, ReportSpan, build_report, render_report, report_heading};

use crate::LocBot;

/// Outcome of one scheduled trigger across all registered groups.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSummary {
    pub delivered: usize,
    pub failed: usize,
}

impl LocBot {
    /// Resolve `span` on `date`, aggregate the group's check-ins and render
    /// the message text.
    pub async fn compose_report(
        &self,
        group_id: i64,
        span: &ReportSpan,
        date: NaiveDate,
    ) -> Result<String, ReportError> {
        let interval = span.resolve(date, &self.zone)?;
        let lines = build_report(&self.storage, group_id, &interval).await?;
        debug!(group_id, %span, rows = lines.len(), "Report built");
        Ok(render_report(&report_heading(span, date), &lines))
    }

    /// Send `text`, giving up after the delivery timeout.
    pub(crate) async fn deliver(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        match tokio::time::timeout(self.delivery_timeout, self.messenger.send_text(chat_id, text))
            .await
        {
            Ok(result) => result,
            Err(_) => bail!("delivery timed out after {:?}", self.delivery_timeout),
        }
    }

    async fn report_to_group(
        &self,
        group_id: i64,
        span: &ReportSpan,
        date: NaiveDate,
    ) -> anyhow::Result<()> {
        let text = self.compose_report(group_id, span, date).await?;
        self.deliver(group_id, &text).await
    }

    /// Build and send the trigger's report to every registered group.
    ///
    /// Groups are handled concurrently; one group's failure or slow delivery
    /// does not affect the others.
    pub async fn run_trigger(self: &Arc<Self>, trigger: &ReportTrigger) -> TriggerSummary {
        let name = &trigger.definition.name;
        let groups = match self.storage.list_groups().await {
            Ok(groups) => groups,
            Err(e) => {
                warn!(definition = %name, "Cannot list groups for scheduled report: {e}");
                return TriggerSummary::default();
            }
        };

        let mut tasks = JoinSet::new();
        for group in groups {
            let bot = Arc::clone(self);
            let span = trigger.definition.span;
            let date = trigger.local_date;
            tasks.spawn(async move {
                let result = bot.report_to_group(group.group_id, &span, date).await;
                (group.group_id, result)
            });
        }

        let mut summary = TriggerSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => summary.delivered += 1,
                Ok((group_id, Err(e))) => {
                    warn!(definition = %name, group_id, "Scheduled report failed: {e:#}");
                    summary.failed += 1;
                }
                Err(e) => {
                    warn!(definition = %name, "Report task panicked: {e}");
                    summary.failed += 1;
                }
            }
        }

        info!(
            definition = %name,
            date = %trigger.local_date,
            delivered = summary.delivered,
            failed = summary.failed,
            "Scheduled report finished"
        );
        summary
    }
}
