use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::risk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Subject {
    Mathematics,
    Physics,
    Literature,
}

impl Subject {
    pub const ALL: [Subject; 3] = [Subject::Mathematics, Subject::Physics, Subject::Literature];

    pub fn as_str(self) -> &'static str {
        match self {
            Subject::Mathematics => "Mathematics",
            Subject::Physics => "Physics",
            Subject::Literature => "Literature",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::Absent => "Absent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

// Case-insensitive parsing shared by the enum `FromStr` impls below.
fn parse_variant<T: Copy>(
    kind: &'static str,
    raw: &str,
    variants: &[(&str, T)],
) -> Result<T, UnknownVariant> {
    let trimmed = raw.trim();
    variants
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
        .map(|(_, value)| *value)
        .ok_or_else(|| UnknownVariant {
            kind,
            value: raw.to_string(),
        })
}

impl FromStr for Subject {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(
            "subject",
            s,
            &[
                ("Mathematics", Subject::Mathematics),
                ("Physics", Subject::Physics),
                ("Literature", Subject::Literature),
            ],
        )
    }
}

impl FromStr for AttendanceStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(
            "attendance status",
            s,
            &[
                ("Present", AttendanceStatus::Present),
                ("Late", AttendanceStatus::Late),
                ("Absent", AttendanceStatus::Absent),
            ],
        )
    }
}

impl FromStr for RiskLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(
            "risk level",
            s,
            &[
                ("Low", RiskLevel::Low),
                ("Medium", RiskLevel::Medium),
                ("High", RiskLevel::High),
            ],
        )
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One daily observation for a student. Stress, mood and risk are always
/// derived from attendance and sleep through [`risk::score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub student_id: i64,
    pub subject: Subject,
    pub date: NaiveDate,
    pub class_time: String,
    pub attendance_status: AttendanceStatus,
    pub stress_level: f64,
    pub sleep_hours: f64,
    pub mood_score: u8,
    pub risk_level: RiskLevel,
}

impl StudentRecord {
    pub(crate) fn scored(
        student_id: i64,
        subject: Subject,
        date: NaiveDate,
        class_time: &str,
        attendance_status: AttendanceStatus,
        sleep_hours: f64,
    ) -> Self {
        let sleep_hours = risk::finite_sleep(sleep_hours);
        let metrics = risk::score(student_id, attendance_status, sleep_hours);
        Self {
            student_id,
            subject,
            date,
            class_time: class_time.to_string(),
            attendance_status,
            stress_level: metrics.stress,
            sleep_hours,
            mood_score: metrics.mood,
            risk_level: metrics.risk,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CohortSummary {
    pub student_id: i64,
    pub last_attendance_status: AttendanceStatus,
    pub current_risk_level: RiskLevel,
    pub average_mood: f64,
    pub record_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiskMix {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentProfile {
    pub student_id: i64,
    pub latest: StudentRecord,
    pub record_count: usize,
    pub average_mood: f64,
    pub average_stress: f64,
    pub average_sleep: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_variants_ignoring_case_and_padding() {
        assert_eq!(" late ".parse::<AttendanceStatus>(), Ok(AttendanceStatus::Late));
        assert_eq!("PHYSICS".parse::<Subject>(), Ok(Subject::Physics));
        assert_eq!("high".parse::<RiskLevel>(), Ok(RiskLevel::High));
        assert!("tardy".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn record_uses_exchange_field_names() {
        let record = StudentRecord::scored(
            101,
            Subject::Mathematics,
            NaiveDate::from_ymd_opt(2026, 2, 3).unwrap(),
            "Manual",
            AttendanceStatus::Absent,
            4.0,
        );
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["studentId"], 101);
        assert_eq!(value["subject"], "Mathematics");
        assert_eq!(value["date"], "2026-02-03");
        assert_eq!(value["classTime"], "Manual");
        assert_eq!(value["attendanceStatus"], "Absent");
        assert_eq!(value["stressLevel"], 3.5);
        assert_eq!(value["sleepHours"], 4.0);
        assert_eq!(value["moodScore"], 2);
        assert_eq!(value["riskLevel"], "High");

        let back: StudentRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn non_finite_sleep_is_stored_finite() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap();
        for sleep in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let record = StudentRecord::scored(
                3,
                Subject::Physics,
                date,
                "Manual",
                AttendanceStatus::Present,
                sleep,
            );
            assert!(record.sleep_hours.is_finite());
            assert_eq!(
                record.risk_level,
                risk::score(3, AttendanceStatus::Present, sleep).risk
            );

            let back: StudentRecord =
                serde_json::from_str(&serde_json::to_string(&record).unwrap()).unwrap();
            assert_eq!(back, record);
        }
    }
}
