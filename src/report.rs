use std::fmt::Write;

use chrono::NaiveDate;

use crate::cohort;
use crate::models::{CohortSummary, StudentRecord, Subject};
use crate::narrative::Narrative;

pub fn format_summary(summary: &CohortSummary) -> String {
    format!(
        "#{} {} risk, last seen {}, avg mood {:.1} across {} records",
        summary.student_id,
        summary.current_risk_level,
        summary.last_attendance_status,
        summary.average_mood,
        summary.record_count
    )
}

pub fn build_report(
    subject: Subject,
    generated_on: NaiveDate,
    records: &[StudentRecord],
    narratives: &[(i64, Narrative)],
) -> String {
    let roster = cohort::summarize(records);
    let mix = cohort::risk_mix(&roster);

    let mut output = String::new();

    let _ = writeln!(output, "# {} Wellbeing Report", subject);
    let _ = writeln!(
        output,
        "Generated {} from {} records across {} students",
        generated_on,
        records.len(),
        roster.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Mix");
    let _ = writeln!(output, "- High: {}", mix.high);
    let _ = writeln!(output, "- Medium: {}", mix.medium);
    let _ = writeln!(output, "- Low: {}", mix.low);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Roster");

    if roster.is_empty() {
        let _ = writeln!(output, "No records for this subject yet.");
    } else {
        for summary in &roster {
            let _ = writeln!(output, "- {}", format_summary(summary));
        }
    }

    if !narratives.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Support Notes");
        for (student_id, narrative) in narratives {
            let _ = writeln!(output);
            let _ = writeln!(output, "### Student #{}", student_id);
            let _ = writeln!(output, "{}", narrative.text().trim_end());
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::manual_entry_on;
    use crate::models::AttendanceStatus;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    #[test]
    fn empty_subject_report() {
        let report = build_report(Subject::Literature, day(), &[], &[]);
        assert!(report.starts_with("# Literature Wellbeing Report"));
        assert!(report.contains("- High: 0"));
        assert!(report.contains("No records for this subject yet."));
        assert!(!report.contains("## Support Notes"));
    }

    #[test]
    fn roster_lines_follow_triage_order() {
        let records = vec![
            manual_entry_on(1, AttendanceStatus::Present, 8.0, Subject::Physics, day()),
            manual_entry_on(2, AttendanceStatus::Absent, 4.0, Subject::Physics, day()),
        ];
        let report = build_report(Subject::Physics, day(), &records, &[]);

        let high = report.find("#2 High risk").unwrap();
        let low = report.find("#1 Low risk").unwrap();
        assert!(high < low);
        assert!(report.contains("from 2 records across 2 students"));
    }

    #[test]
    fn includes_fallback_narratives() {
        let records = vec![manual_entry_on(
            2,
            AttendanceStatus::Absent,
            4.0,
            Subject::Physics,
            day(),
        )];
        let narratives = vec![(2, Narrative::Unavailable("timed out".to_string()))];
        let report = build_report(Subject::Physics, day(), &records, &narratives);

        assert!(report.contains("### Student #2"));
        assert!(report.contains("Narrative unavailable (timed out)"));
    }
}
