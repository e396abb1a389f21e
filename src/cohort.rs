use std::collections::HashMap;

use crate::models::{CohortSummary, RiskLevel, RiskMix, StudentProfile, StudentRecord};
use crate::risk::risk_priority;

struct Group<'a> {
    last: &'a StudentRecord,
    mood_total: f64,
    count: usize,
}

/// Builds the triage roster for one subject's records.
///
/// "Last" means last appended, not latest `date`: a late correction appended
/// after newer observations becomes the student's current status.
/// Ordered by risk priority descending, then student id ascending.
pub fn summarize(records: &[StudentRecord]) -> Vec<CohortSummary> {
    let mut groups: HashMap<i64, Group<'_>> = HashMap::new();

    for record in records {
        let group = groups.entry(record.student_id).or_insert(Group {
            last: record,
            mood_total: 0.0,
            count: 0,
        });
        group.last = record;
        group.mood_total += f64::from(record.mood_score);
        group.count += 1;
    }

    let mut roster: Vec<CohortSummary> = groups
        .into_iter()
        .map(|(student_id, group)| CohortSummary {
            student_id,
            last_attendance_status: group.last.attendance_status,
            current_risk_level: group.last.risk_level,
            average_mood: group.mood_total / group.count as f64,
            record_count: group.count,
        })
        .collect();

    roster.sort_by(|a, b| {
        risk_priority(b.current_risk_level)
            .cmp(&risk_priority(a.current_risk_level))
            .then(a.student_id.cmp(&b.student_id))
    });
    roster
}

pub fn risk_mix(roster: &[CohortSummary]) -> RiskMix {
    roster.iter().fold(RiskMix::default(), |mut mix, summary| {
        match summary.current_risk_level {
            RiskLevel::High => mix.high += 1,
            RiskLevel::Medium => mix.medium += 1,
            RiskLevel::Low => mix.low += 1,
        }
        mix
    })
}

pub fn student_profile(student_id: i64, records: &[StudentRecord]) -> Option<StudentProfile> {
    let history: Vec<&StudentRecord> = records
        .iter()
        .filter(|record| record.student_id == student_id)
        .collect();
    let latest = (*history.last()?).clone();
    let count = history.len() as f64;

    Some(StudentProfile {
        student_id,
        latest,
        record_count: history.len(),
        average_mood: history.iter().map(|r| f64::from(r.mood_score)).sum::<f64>() / count,
        average_stress: history.iter().map(|r| r.stress_level).sum::<f64>() / count,
        average_sleep: history.iter().map(|r| r.sleep_hours).sum::<f64>() / count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{ingest_rows_on, manual_entry_on, read_json_rows};
    use crate::models::{AttendanceStatus, Subject};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn on(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, day).unwrap()
    }

    fn entry(student_id: i64, status: AttendanceStatus, sleep: f64, day: u32) -> StudentRecord {
        manual_entry_on(student_id, status, sleep, Subject::Mathematics, on(day))
    }

    fn ids(roster: &[CohortSummary]) -> Vec<i64> {
        roster.iter().map(|summary| summary.student_id).collect()
    }

    #[test]
    fn empty_snapshot_yields_empty_roster() {
        assert!(summarize(&[]).is_empty());
    }

    #[test]
    fn ranks_by_risk_then_id() {
        let records = vec![
            entry(1, AttendanceStatus::Present, 8.0, 1),
            entry(2, AttendanceStatus::Absent, 4.0, 1),
            entry(3, AttendanceStatus::Late, 4.0, 1),
            entry(4, AttendanceStatus::Absent, 3.0, 1),
        ];
        let levels: Vec<RiskLevel> = records.iter().map(|r| r.risk_level).collect();
        assert_eq!(
            levels,
            vec![RiskLevel::Low, RiskLevel::High, RiskLevel::Medium, RiskLevel::High]
        );

        assert_eq!(ids(&summarize(&records)), vec![2, 4, 3, 1]);
    }

    #[test]
    fn current_status_follows_append_order() {
        let records = vec![
            entry(9, AttendanceStatus::Present, 8.0, 20),
            entry(9, AttendanceStatus::Absent, 3.0, 5),
        ];
        let roster = summarize(&records);

        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].last_attendance_status, AttendanceStatus::Absent);
        assert_eq!(roster[0].current_risk_level, RiskLevel::High);
    }

    #[test]
    fn average_mood_is_not_truncated() {
        let records = vec![
            entry(6, AttendanceStatus::Present, 8.0, 1),
            entry(6, AttendanceStatus::Present, 7.5, 2),
        ];
        let moods: Vec<u8> = records.iter().map(|r| r.mood_score).collect();
        let roster = summarize(&records);
        let expected = (f64::from(moods[0]) + f64::from(moods[1])) / 2.0;

        assert_eq!(roster[0].average_mood, expected);
        assert_eq!(roster[0].record_count, 2);
    }

    #[test]
    fn snapshot_is_left_untouched() {
        let records = vec![
            entry(3, AttendanceStatus::Present, 8.0, 1),
            entry(1, AttendanceStatus::Absent, 2.0, 1),
        ];
        let before = records.clone();
        let _ = summarize(&records);
        assert_eq!(records, before);
    }

    #[test]
    fn grouped_counts_match_accepted_rows() {
        let batch = read_json_rows(
            r#"[
                {"id": 1, "sleep": 7}, {"id": "x"}, {"id": 2, "status": "Late"},
                {"id": 1, "status": "Absent"}, {"regno": 2}, {"id": 1}
            ]"#
            .as_bytes(),
        )
        .unwrap();
        let outcome = ingest_rows_on(&batch, Subject::Mathematics, on(2));
        let roster = summarize(&outcome.records);

        let counts: HashMap<i64, usize> =
            roster.iter().map(|s| (s.student_id, s.record_count)).collect();
        assert_eq!(counts[&1], 3);
        assert_eq!(counts[&2], 2);
        assert_eq!(counts.values().sum::<usize>(), outcome.accepted);
    }

    #[test]
    fn tallies_current_risk() {
        let records = vec![
            entry(1, AttendanceStatus::Present, 8.0, 1),
            entry(2, AttendanceStatus::Absent, 4.0, 1),
            entry(3, AttendanceStatus::Late, 4.0, 1),
            entry(4, AttendanceStatus::Absent, 3.0, 1),
        ];
        let mix = risk_mix(&summarize(&records));
        assert_eq!(mix, RiskMix { high: 2, medium: 1, low: 1 });
    }

    #[test]
    fn profile_averages_history() {
        let records = vec![
            entry(5, AttendanceStatus::Present, 8.0, 1),
            entry(8, AttendanceStatus::Late, 6.0, 1),
            entry(5, AttendanceStatus::Late, 6.0, 2),
        ];
        let profile = student_profile(5, &records).unwrap();

        assert_eq!(profile.record_count, 2);
        assert_eq!(profile.latest, records[2]);
        assert_eq!(profile.average_sleep, 7.0);
        assert_eq!(
            profile.average_stress,
            (records[0].stress_level + records[2].stress_level) / 2.0
        );
        assert!(student_profile(99, &records).is_none());
    }
}
