use std::path::{Path, PathBuf};

use anyhow::Context;
use uuid::Uuid;

use crate::models::{StudentRecord, Subject};

/// Append-only record holder. Queries return records in append order.
#[allow(async_fn_in_trait)]
pub trait DataStore {
    async fn append(&mut self, records: &[StudentRecord]) -> anyhow::Result<()>;

    async fn by_subject(&self, subject: Subject) -> anyhow::Result<Vec<StudentRecord>>;

    async fn by_student(&self, student_id: i64) -> anyhow::Result<Vec<StudentRecord>>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: Vec<StudentRecord>,
}

impl DataStore for MemoryStore {
    async fn append(&mut self, records: &[StudentRecord]) -> anyhow::Result<()> {
        self.records.extend_from_slice(records);
        Ok(())
    }

    async fn by_subject(&self, subject: Subject) -> anyhow::Result<Vec<StudentRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|record| record.subject == subject)
            .cloned()
            .collect())
    }

    async fn by_student(&self, student_id: i64) -> anyhow::Result<Vec<StudentRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|record| record.student_id == student_id)
            .cloned()
            .collect())
    }
}

/// Whole record sequence kept as one JSON array on disk, rewritten on
/// every append through a sibling temp file and a rename. Concurrent writers
/// are not coordinated: the last rename wins.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            if raw.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&raw)
                    .with_context(|| format!("{} is not a record file", path.display()))?
            }
        } else {
            Vec::new()
        };

        tracing::debug!(path = %path.display(), records = records.len(), "opened record file");
        Ok(Self {
            path,
            inner: MemoryStore { records },
        })
    }

    fn flush(&self) -> anyhow::Result<()> {
        let body = serde_json::to_string_pretty(&self.inner.records)?;
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "records.json".to_string());
        let staging = self
            .path
            .with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

        std::fs::write(&staging, body)
            .with_context(|| format!("failed to write {}", staging.display()))?;
        if let Err(err) = std::fs::rename(&staging, &self.path) {
            let _ = std::fs::remove_file(&staging);
            return Err(err).with_context(|| format!("failed to replace {}", self.path.display()));
        }
        Ok(())
    }
}

impl DataStore for JsonFileStore {
    async fn append(&mut self, records: &[StudentRecord]) -> anyhow::Result<()> {
        self.inner.append(records).await?;
        self.flush()
    }

    async fn by_subject(&self, subject: Subject) -> anyhow::Result<Vec<StudentRecord>> {
        self.inner.by_subject(subject).await
    }

    async fn by_student(&self, student_id: i64) -> anyhow::Result<Vec<StudentRecord>> {
        self.inner.by_student(student_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::manual_entry_on;
    use crate::models::AttendanceStatus;
    use chrono::NaiveDate;

    fn record(student_id: i64, subject: Subject, sleep: f64) -> StudentRecord {
        manual_entry_on(
            student_id,
            AttendanceStatus::Present,
            sleep,
            subject,
            NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(),
        )
    }

    #[tokio::test]
    async fn queries_keep_append_order() {
        let mut store = MemoryStore::default();
        store
            .append(&[
                record(2, Subject::Physics, 6.0),
                record(1, Subject::Mathematics, 7.0),
                record(2, Subject::Mathematics, 8.0),
            ])
            .await
            .unwrap();
        store.append(&[record(2, Subject::Physics, 5.0)]).await.unwrap();

        let physics = store.by_subject(Subject::Physics).await.unwrap();
        let sleeps: Vec<f64> = physics.iter().map(|r| r.sleep_hours).collect();
        assert_eq!(sleeps, vec![6.0, 5.0]);

        let student = store.by_student(2).await.unwrap();
        let sleeps: Vec<f64> = student.iter().map(|r| r.sleep_hours).collect();
        assert_eq!(sleeps, vec![6.0, 8.0, 5.0]);
        assert_eq!(store.records.len(), 4);
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let path = std::env::temp_dir().join(format!("silent-signals-{}.json", Uuid::new_v4()));

        let mut store = JsonFileStore::open(&path).unwrap();
        store.append(&[record(4, Subject::Literature, 6.5)]).await.unwrap();
        store.append(&[record(5, Subject::Literature, 9.0)]).await.unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        let records = reopened.by_subject(Subject::Literature).await.unwrap();
        assert_eq!(
            records,
            vec![
                record(4, Subject::Literature, 6.5),
                record(5, Subject::Literature, 9.0)
            ]
        );

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn non_finite_sleep_keeps_file_readable() {
        let path = std::env::temp_dir().join(format!("silent-signals-{}.json", Uuid::new_v4()));

        let mut store = JsonFileStore::open(&path).unwrap();
        store
            .append(&[
                record(3, Subject::Physics, f64::INFINITY),
                record(3, Subject::Physics, f64::NAN),
            ])
            .await
            .unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        let records = reopened.by_student(3).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.sleep_hours.is_finite()));
        assert_eq!(records[1].sleep_hours, 0.0);

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn append_leaves_no_staging_files() {
        let dir = std::env::temp_dir().join(format!("silent-signals-{}", Uuid::new_v4()));
        std::fs::create_dir(&dir).unwrap();
        let path = dir.join("records.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        store.append(&[record(1, Subject::Physics, 7.0)]).await.unwrap();
        store.append(&[record(2, Subject::Physics, 8.0)]).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["records.json".to_string()]);
        assert_eq!(JsonFileStore::open(&path).unwrap().inner.records.len(), 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn corrupt_file_is_reported() {
        let path = std::env::temp_dir().join(format!("silent-signals-{}.json", Uuid::new_v4()));
        std::fs::write(&path, "{not json").unwrap();
        assert!(JsonFileStore::open(&path).is_err());
        std::fs::remove_file(&path).unwrap();
    }
}
