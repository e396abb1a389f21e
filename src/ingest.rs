use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;

use chrono::{Duration, NaiveDate, Utc};
use serde_json::{Map, Value};

use crate::error::IngestError;
use crate::models::{AttendanceStatus, StudentRecord, Subject};

pub const MANUAL_CLASS_TIME: &str = "Manual";
pub const BATCH_CLASS_TIME: &str = "Daily Batch";
pub const SEED_CLASS_TIME: &str = "09:00-15:00";
pub const DEFAULT_SLEEP_HOURS: f64 = 7.5;

/// One loosely-structured import row: column label to scalar value, in
/// column order. When two labels normalize to the same key, the later column
/// wins.
pub type RawRow = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    StudentId,
    Attendance,
    Sleep,
}

impl Field {
    /// Accepted column labels after [`normalize_key`], in lookup order.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::StudentId => &["registerno", "regno", "id", "studentid"],
            Field::Attendance => &["status", "attendance"],
            Field::Sleep => &["sleep", "sleephours"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowRejection {
    MissingStudentId,
    UnknownStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub records: Vec<StudentRecord>,
    pub total_rows: usize,
    pub accepted: usize,
}

impl BatchOutcome {
    pub fn skipped(&self) -> usize {
        self.total_rows - self.accepted
    }
}

#[derive(Debug, Clone)]
pub enum BatchSource {
    Csv(PathBuf),
    Json(PathBuf),
}

impl BatchSource {
    pub fn read_rows(&self) -> Result<Vec<RawRow>, IngestError> {
        match self {
            BatchSource::Csv(path) => read_csv_rows(std::fs::File::open(path)?),
            BatchSource::Json(path) => read_json_rows(std::fs::File::open(path)?),
        }
    }
}

/// Headers must be valid UTF-8. Undecodable cells are kept lossily, so they
/// fail only their own field and the row falls back like any bad value.
pub fn read_csv_rows<R: Read>(reader: R) -> Result<Vec<RawRow>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for (index, result) in reader.byte_records().enumerate() {
        let record = result?;
        if std::str::from_utf8(record.as_slice()).is_err() {
            tracing::debug!(row = index, "batch row has undecodable cells");
        }
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| {
                let cell = String::from_utf8_lossy(cell).into_owned();
                (header.to_string(), Value::String(cell))
            })
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// Expects a JSON array; elements that are not objects count as empty rows.
pub fn read_json_rows<R: Read>(reader: R) -> Result<Vec<RawRow>, IngestError> {
    match serde_json::from_reader::<_, Value>(reader)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => row,
                _ => RawRow::new(),
            })
            .collect()),
        other => Err(IngestError::MalformedInput(format!(
            "expected an array of rows, found {}",
            json_kind(&other)
        ))),
    }
}

pub fn manual_entry(
    student_id: i64,
    status: AttendanceStatus,
    sleep_hours: f64,
    subject: Subject,
) -> StudentRecord {
    manual_entry_on(student_id, status, sleep_hours, subject, today())
}

pub fn manual_entry_on(
    student_id: i64,
    status: AttendanceStatus,
    sleep_hours: f64,
    subject: Subject,
    date: NaiveDate,
) -> StudentRecord {
    StudentRecord::scored(student_id, subject, date, MANUAL_CLASS_TIME, status, sleep_hours)
}

pub fn ingest_rows(rows: &[RawRow], subject: Subject) -> BatchOutcome {
    ingest_rows_on(rows, subject, today())
}

pub fn ingest_rows_on(rows: &[RawRow], subject: Subject, date: NaiveDate) -> BatchOutcome {
    let mut records = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        match record_from_row(row, subject, date) {
            Ok(record) => records.push(record),
            Err(reason) => tracing::debug!(row = index, ?reason, "skipping batch row"),
        }
    }

    let outcome = BatchOutcome {
        accepted: records.len(),
        total_rows: rows.len(),
        records,
    };
    tracing::info!(
        subject = %subject,
        total = outcome.total_rows,
        accepted = outcome.accepted,
        skipped = outcome.skipped(),
        "batch ingested"
    );
    outcome
}

/// Demo history: eight students per subject, one record per day for the
/// four days before `today`.
pub fn seed_records(today: NaiveDate) -> Vec<StudentRecord> {
    let mut records = Vec::new();

    for subject in Subject::ALL {
        for student_id in 1..=8_i64 {
            for day in 0..4_i64 {
                let date = today - Duration::days(4 - day);
                let sleep = 5.0 + ((student_id * 7 + day * 3) % 9) as f64 * 0.5;
                let status = match (student_id + day) % 7 {
                    0 => AttendanceStatus::Absent,
                    3 | 5 => AttendanceStatus::Late,
                    _ => AttendanceStatus::Present,
                };
                records.push(StudentRecord::scored(
                    student_id,
                    subject,
                    date,
                    SEED_CLASS_TIME,
                    status,
                    sleep,
                ));
            }
        }
    }

    records
}

/// Lowercases and drops whitespace and underscores: `"Register No"`,
/// `"register_no"` and `"REGISTERNO"` all become `"registerno"`.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn record_from_row(
    row: &RawRow,
    subject: Subject,
    date: NaiveDate,
) -> Result<StudentRecord, RowRejection> {
    let normalized: HashMap<String, &Value> = row
        .iter()
        .map(|(key, value)| (normalize_key(key), value))
        .collect();

    let student_id = lookup(&normalized, Field::StudentId)
        .and_then(parse_student_id)
        .ok_or(RowRejection::MissingStudentId)?;
    let status = parse_status(lookup(&normalized, Field::Attendance))?;
    let sleep_hours = lookup(&normalized, Field::Sleep)
        .and_then(parse_real)
        .unwrap_or(DEFAULT_SLEEP_HOURS);

    Ok(StudentRecord::scored(
        student_id,
        subject,
        date,
        BATCH_CLASS_TIME,
        status,
        sleep_hours,
    ))
}

// Null and blank cells fall through to the next alias.
fn lookup<'a>(normalized: &HashMap<String, &'a Value>, field: Field) -> Option<&'a Value> {
    field
        .aliases()
        .iter()
        .filter_map(|alias| normalized.get(*alias).copied())
        .find(|value| match value {
            Value::Null => false,
            Value::String(text) => !text.trim().is_empty(),
            _ => true,
        })
}

fn parse_student_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::Number(number) => number.as_i64().or_else(|| number.as_f64().and_then(integral)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }?;
    (id > 0).then_some(id)
}

fn integral(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64)
        .then_some(value as i64)
}

fn parse_status(value: Option<&Value>) -> Result<AttendanceStatus, RowRejection> {
    match value {
        None => Ok(AttendanceStatus::Present),
        Some(Value::String(text)) => text.parse().map_err(|_| RowRejection::UnknownStatus),
        Some(_) => Err(RowRejection::UnknownStatus),
    }
}

fn parse_real(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
