use anyhow::Context;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{StudentRecord, Subject};
use crate::store::DataStore;

const SELECT_RECORDS: &str = "SELECT student_id, subject, recorded_on, class_time, \
     attendance_status, stress_level, sleep_hours, mood_score, risk_level \
     FROM silent_signals.records";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")?;
        Ok(Self { pool })
    }

    pub async fn init_db(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

impl DataStore for PgStore {
    async fn append(&mut self, records: &[StudentRecord]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO silent_signals.records
                (id, student_id, subject, recorded_on, class_time, attendance_status,
                 stress_level, sleep_hours, mood_score, risk_level)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(record.student_id)
            .bind(record.subject.as_str())
            .bind(record.date)
            .bind(&record.class_time)
            .bind(record.attendance_status.as_str())
            .bind(record.stress_level)
            .bind(record.sleep_hours)
            .bind(i16::from(record.mood_score))
            .bind(record.risk_level.as_str())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to insert record for student {}", record.student_id))?;
        }

        tx.commit().await?;
        tracing::debug!(count = records.len(), "appended records to Postgres");
        Ok(())
    }

    async fn by_subject(&self, subject: Subject) -> anyhow::Result<Vec<StudentRecord>> {
        let query = format!("{SELECT_RECORDS} WHERE subject = $1 ORDER BY seq");
        let rows = sqlx::query(&query)
            .bind(subject.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn by_student(&self, student_id: i64) -> anyhow::Result<Vec<StudentRecord>> {
        let query = format!("{SELECT_RECORDS} WHERE student_id = $1 ORDER BY seq");
        let rows = sqlx::query(&query)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }
}

fn record_from_row(row: &PgRow) -> anyhow::Result<StudentRecord> {
    let mood_score: i16 = row.get("mood_score");

    Ok(StudentRecord {
        student_id: row.get("student_id"),
        subject: row.get::<String, _>("subject").parse()?,
        date: row.get("recorded_on"),
        class_time: row.get("class_time"),
        attendance_status: row.get::<String, _>("attendance_status").parse()?,
        stress_level: row.get("stress_level"),
        sleep_hours: row.get("sleep_hours"),
        mood_score: u8::try_from(mood_score).context("mood score out of range")?,
        risk_level: row.get::<String, _>("risk_level").parse()?,
    })
}
