use crate::models::{AttendanceStatus, RiskLevel};

const STRESS_MIN: f64 = 0.0;
const STRESS_MAX: f64 = 5.0;
const MOOD_MIN: f64 = 1.0;
const MOOD_MAX: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub stress: f64,
    pub mood: u8,
    pub risk: RiskLevel,
}

/// Derives stress, mood and risk tier for one observation.
///
/// Total over every input: out-of-range values are clamped, never rejected.
pub fn score(student_id: i64, status: AttendanceStatus, sleep_hours: f64) -> Metrics {
    let sleep = finite_sleep(sleep_hours);
    let id_factor = (student_id % 10) as f64 * 0.1;
    let penalty = attendance_penalty(status);

    let stress = ((9.0 - sleep) * 0.4 + penalty * 0.4 + id_factor).clamp(STRESS_MIN, STRESS_MAX);
    let mood = (sleep * 0.8 - penalty * 1.2 + 3.0 + id_factor).clamp(MOOD_MIN, MOOD_MAX);

    let stress = round_to_hundredths(stress);
    let mood = mood.round() as u8;

    Metrics {
        stress,
        mood,
        risk: classify(stress, mood),
    }
}

/// `NaN` counts as no sleep at all; infinities clamp to the largest finite
/// magnitude so the value still scores the same and stays serializable.
pub fn finite_sleep(sleep_hours: f64) -> f64 {
    if sleep_hours.is_nan() {
        0.0
    } else {
        sleep_hours.clamp(f64::MIN, f64::MAX)
    }
}

pub fn attendance_penalty(status: AttendanceStatus) -> f64 {
    match status {
        AttendanceStatus::Absent => 3.5,
        AttendanceStatus::Late => 1.5,
        AttendanceStatus::Present => 0.0,
    }
}

/// First matching tier wins: High, then Medium, else Low.
pub fn classify(stress: f64, mood: u8) -> RiskLevel {
    if stress > 3.5 || mood < 4 {
        RiskLevel::High
    } else if stress > 2.5 || mood < 6 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Rank used for every risk ordering. Higher sorts first in triage views.
pub fn risk_priority(level: RiskLevel) -> u8 {
    match level {
        RiskLevel::High => 3,
        RiskLevel::Medium => 2,
        RiskLevel::Low => 1,
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
