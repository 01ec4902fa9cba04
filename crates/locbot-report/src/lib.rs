//! locbot-report: turning stored check-ins into attendance reports.
//!
//! - [`interval`] converts local report boundaries into UTC ranges
//! - [`aggregate`] counts allowed members' check-ins inside a range
//! - [`render`] formats the result as message text

pub mod aggregate;
pub mod interval;
pub mod render;

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use locbot_storage::StorageError;

pub use aggregate::{ReportLine, aggregate, build_report};
pub use interval::{Interval, ReportSpan, resolve};
pub use render::{render_report, report_heading};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Invalid time `{0}`, expected HH:MM")]
    InvalidTimeFormat(String),
    #[error("Local time {0} does not exist in the report timezone")]
    NonexistentLocalTime(NaiveDateTime),
    #[error("Interval start {start} is after end {end}")]
    UnknownInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("Storage unavailable: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, ReportError>;
