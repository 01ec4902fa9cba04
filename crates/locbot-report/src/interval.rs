//! Local report boundaries → absolute UTC intervals.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use locbot_types::parse_hm;

use crate::{ReportError, Result};

/// A closed UTC interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

/// What a report covers on a given local date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSpan {
    /// A time-of-day window; rolls over midnight when `end <= start`.
    Window { start: NaiveTime, end: NaiveTime },
    /// The whole local day, `00:00:00` through `23:59:59`.
    FullDay,
}

impl ReportSpan {
    /// Build a window from two `HH:MM` strings.
    pub fn window(start_hm: &str, end_hm: &str) -> Result<Self> {
        Ok(ReportSpan::Window {
            start: parse_time(start_hm)?,
            end: parse_time(end_hm)?,
        })
    }

    /// Resolve against a local date in `zone`.
    pub fn resolve<Tz: TimeZone>(&self, local_date: NaiveDate, zone: &Tz) -> Result<Interval> {
        match *self {
            ReportSpan::Window { start, end } => resolve_times(local_date, start, end, zone),
            ReportSpan::FullDay => resolve_times(
                local_date,
                NaiveTime::MIN,
                NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
                zone,
            ),
        }
    }
}

impl std::fmt::Display for ReportSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportSpan::Window { start, end } => {
                write!(f, "{}–{}", start.format("%H:%M"), end.format("%H:%M"))
            }
            ReportSpan::FullDay => f.write_str("full day"),
        }
    }
}

/// Resolve `start_hm`/`end_hm` on `local_date` in `zone` to a UTC interval.
///
/// When the end is not after the start it is moved to the next calendar day,
/// so `23:00`–`01:00` spans midnight and equal times span a whole day.
pub fn resolve<Tz: TimeZone>(
    local_date: NaiveDate,
    start_hm: &str,
    end_hm: &str,
    zone: &Tz,
) -> Result<Interval> {
    resolve_times(local_date, parse_time(start_hm)?, parse_time(end_hm)?, zone)
}

fn resolve_times<Tz: TimeZone>(
    local_date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    zone: &Tz,
) -> Result<Interval> {
    let start_local = local_date.and_time(start);
    let mut end_local = local_date.and_time(end);
    if end_local <= start_local {
        end_local = end_local
            .checked_add_days(Days::new(1))
            .ok_or(ReportError::NonexistentLocalTime(end_local))?;
    }

    Ok(Interval {
        start: to_utc(start_local, zone)?,
        end: to_utc(end_local, zone)?,
    })
}

/// Ambiguous local times (DST fall-back) resolve to the earlier instant.
fn to_utc<Tz: TimeZone>(local: NaiveDateTime, zone: &Tz) -> Result<DateTime<Utc>> {
    zone.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(ReportError::NonexistentLocalTime(local))
}

fn parse_time(input: &str) -> Result<NaiveTime> {
    parse_hm(input).ok_or_else(|| ReportError::InvalidTimeFormat(input.to_string()))
}
