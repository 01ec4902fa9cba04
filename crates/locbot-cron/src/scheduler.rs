//! Report scheduler: computes the next wall-clock fire and emits triggers.

use std::sync::Arc;

use chrono::{DateTime, Days, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{ReportDefinition, ReportTrigger};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Earliest instant strictly after `now` at which `definition` fires in `zone`.
///
/// Local trigger times that don't exist on a day (DST gap) skip that day.
pub fn next_fire(
    definition: &ReportDefinition,
    now: DateTime<Utc>,
    zone: &Tz,
) -> Option<DateTime<Utc>> {
    let today = now.with_timezone(zone).date_naive();
    (0..=2u64)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter_map(|date| {
            zone.from_local_datetime(&date.and_time(definition.trigger_at))
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .find(|fire| *fire > now)
}

/// Drives the fixed set of report definitions.
pub struct ReportScheduler {
    definitions: Vec<ReportDefinition>,
    zone: Tz,
    clock: Arc<dyn Clock>,
}

impl ReportScheduler {
    /// Create a scheduler on the system clock.
    pub fn new(definitions: Vec<ReportDefinition>, zone: Tz) -> Self {
        Self::with_clock(definitions, zone, Arc::new(SystemClock))
    }

    pub fn with_clock(definitions: Vec<ReportDefinition>, zone: Tz, clock: Arc<dyn Clock>) -> Self {
        Self {
            definitions,
            zone,
            clock,
        }
    }

    pub fn definitions(&self) -> &[ReportDefinition] {
        &self.definitions
    }

    /// The soonest fire time after `now` and every definition due at it.
    pub fn next_due(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, Vec<&ReportDefinition>)> {
        let fires: Vec<_> = self
            .definitions
            .iter()
            .filter_map(|d| next_fire(d, now, &self.zone).map(|at| (at, d)))
            .collect();
        let soonest = fires.iter().map(|(at, _)| *at).min()?;
        let due = fires
            .into_iter()
            .filter(|(at, _)| *at == soonest)
            .map(|(_, d)| d)
            .collect();
        Some((soonest, due))
    }

    /// Start the scheduler loop (runs in background).
    ///
    /// Exits when `cancel` fires or the receiving side of `trigger_sender`
    /// is dropped. Sending never blocks, so slow report delivery downstream
    /// can't delay later triggers.
    pub async fn run_scheduler(
        self: Arc<Self>,
        trigger_sender: mpsc::UnboundedSender<ReportTrigger>,
        cancel: CancellationToken,
    ) {
        info!(
            definitions = self.definitions.len(),
            zone = %self.zone,
            "Report scheduler started"
        );

        loop {
            let now = self.clock.now();
            let Some((fire_at, due)) = self.next_due(now) else {
                info!("No report definitions to schedule");
                break;
            };

            let wait = (fire_at - now).to_std().unwrap_or_default();
            debug!(fire_at = %fire_at, wait_secs = wait.as_secs(), "Waiting for next report");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {},
            }

            let fired_at = self.clock.now();
            if fired_at < fire_at {
                // Woke early relative to the wall clock; wait out the rest.
                continue;
            }

            let local_date = fire_at.with_timezone(&self.zone).date_naive();
            for definition in due {
                info!(definition = %definition.name, %local_date, "Report trigger fired");
                let trigger = ReportTrigger {
                    definition: definition.clone(),
                    local_date,
                    fired_at,
                };
                if trigger_sender.send(trigger).is_err() {
                    warn!("Trigger receiver closed, stopping report scheduler");
                    return;
                }
            }
        }

        info!("Report scheduler stopped");
    }
}
