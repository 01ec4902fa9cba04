//! Report message text.

use std::fmt::Write;

use chrono::NaiveDate;

use crate::aggregate::ReportLine;
use crate::interval::ReportSpan;

/// Header line for a report of `span` on `date`.
pub fn report_heading(span: &ReportSpan, date: NaiveDate) -> String {
    match span {
        ReportSpan::Window { .. } => format!("📅 Report ({span}):"),
        ReportSpan::FullDay => format!("📆 Daily report ({}):", date.format("%Y-%m-%d")),
    }
}

/// Header, a blank line, then one `name: N check-ins` line per row.
pub fn render_report(heading: &str, lines: &[ReportLine]) -> String {
    let mut text = format!("{heading}\n\n");
    for line in lines {
        let noun = if line.count == 1 { "check-in" } else { "check-ins" };
        let _ = writeln!(text, "{}: {} {noun}", line.name, line.count);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(member_id: i64, name: &str, count: u64) -> ReportLine {
        ReportLine {
            member_id,
            name: name.into(),
            count,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
    }

    #[test]
    fn test_headings() {
        let window = ReportSpan::window("8:00", "09:30").unwrap();
        assert_eq!(report_heading(&window, date()), "📅 Report (08:00–09:30):");
        assert_eq!(
            report_heading(&ReportSpan::FullDay, date()),
            "📆 Daily report (2024-05-06):"
        );
    }

    #[test]
    fn test_render_lines() {
        let lines = vec![
            line(1, "alice", 3),
            line(2, "user_2", 1),
            line(3, "Bob Lee", 0),
        ];
        let text = render_report("📅 Report (08:00–09:30):", &lines);
        assert_eq!(
            text,
            "📅 Report (08:00–09:30):\n\nalice: 3 check-ins\nuser_2: 1 check-in\nBob Lee: 0 check-ins\n"
        );
    }

    #[test]
    fn test_render_empty_is_header_only() {
        let text = render_report("📆 Daily report (2024-05-06):", &[]);
        assert_eq!(text, "📆 Daily report (2024-05-06):\n\n");
        assert_eq!(text.lines().filter(|l| !l.is_empty()).count(), 1);
    }
}
