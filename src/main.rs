use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cohort;
mod config;
mod db;
mod error;
mod ingest;
mod models;
mod narrative;
mod report;
mod risk;
mod store;

use config::Config;
use db::PgStore;
use ingest::BatchSource;
use models::{AttendanceStatus, StudentRecord, Subject};
use narrative::{GeminiNarrator, Narrative};
use store::{DataStore, JsonFileStore};

#[derive(Parser)]
#[command(name = "silent-signals")]
#[command(about = "Student wellbeing scoring and cohort triage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Append demo history for every subject
    Seed,
    /// Record one observation by hand
    Log {
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        student_id: i64,
        #[arg(long, value_enum)]
        status: AttendanceStatus,
        #[arg(long, value_parser = parse_sleep_hours)]
        sleep: f64,
        #[arg(long, value_enum)]
        subject: Subject,
    },
    /// Import a batch of rows from a CSV or JSON file
    #[command(group(
        ArgGroup::new("source")
            .args(["csv", "json"])
            .required(true)
            .multiple(false)
    ))]
    Import {
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        json: Option<PathBuf>,
        #[arg(long, value_enum)]
        subject: Subject,
    },
    /// Rank a subject's students by current risk
    Roster {
        #[arg(long, value_enum)]
        subject: Subject,
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
    /// Show one student's records
    History {
        #[arg(long)]
        student_id: i64,
        #[arg(long, value_enum)]
        subject: Option<Subject>,
    },
    /// Generate a markdown report for a subject
    Report {
        #[arg(long, value_enum)]
        subject: Subject,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        /// Request support notes for this many top-ranked students
        #[arg(long, default_value_t = 0)]
        narrate: usize,
    },
}

fn parse_sleep_hours(raw: &str) -> Result<f64, String> {
    let hours: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{raw:?} is not a number of hours"))?;
    if hours.is_finite() {
        Ok(hours)
    } else {
        Err(format!("{raw:?} is not a finite number of hours"))
    }
}

enum Backend {
    Postgres(PgStore),
    File(JsonFileStore),
}

impl DataStore for Backend {
    async fn append(&mut self, records: &[StudentRecord]) -> anyhow::Result<()> {
        match self {
            Backend::Postgres(store) => store.append(records).await,
            Backend::File(store) => store.append(records).await,
        }
    }

    async fn by_subject(&self, subject: Subject) -> anyhow::Result<Vec<StudentRecord>> {
        match self {
            Backend::Postgres(store) => store.by_subject(subject).await,
            Backend::File(store) => store.by_subject(subject).await,
        }
    }

    async fn by_student(&self, student_id: i64) -> anyhow::Result<Vec<StudentRecord>> {
        match self {
            Backend::Postgres(store) => store.by_student(student_id).await,
            Backend::File(store) => store.by_student(student_id).await,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let mut backend = match &config.database_url {
        Some(url) => Backend::Postgres(PgStore::connect(url).await?),
        None => Backend::File(JsonFileStore::open(&config.data_file)?),
    };

    match cli.command {
        Commands::InitDb => match &backend {
            Backend::Postgres(store) => {
                store.init_db().await?;
                println!("Schema ready.");
            }
            Backend::File(_) => {
                println!(
                    "No schema needed for file store {}.",
                    config.data_file.display()
                );
            }
        },
        Commands::Seed => {
            let records = ingest::seed_records(Utc::now().date_naive());
            backend.append(&records).await?;
            println!("Seed data inserted ({} records).", records.len());
        }
        Commands::Log {
            student_id,
            status,
            sleep,
            subject,
        } => {
            let record = ingest::manual_entry(student_id, status, sleep, subject);
            backend.append(std::slice::from_ref(&record)).await?;
            println!(
                "Log recorded for student #{}: stress {:.2}, mood {}, {} risk.",
                record.student_id, record.stress_level, record.mood_score, record.risk_level
            );
        }
        Commands::Import { csv, json, subject } => {
            let source = match (csv, json) {
                (Some(path), _) => BatchSource::Csv(path),
                (None, Some(path)) => BatchSource::Json(path),
                (None, None) => anyhow::bail!("either --csv or --json is required"),
            };
            let rows = source
                .read_rows()
                .with_context(|| format!("failed to import {:?}", source))?;
            let outcome = ingest::ingest_rows(&rows, subject);

            if outcome.records.is_empty() {
                println!("No valid records found in {} rows. Check headers.", outcome.total_rows);
                return Ok(());
            }

            backend.append(&outcome.records).await?;
            println!(
                "Processed {}/{} rows into {} records.",
                outcome.accepted, outcome.total_rows, subject
            );
        }
        Commands::Roster { subject, limit } => {
            let records = backend.by_subject(subject).await?;
            let roster = cohort::summarize(&records);

            if roster.is_empty() {
                println!("No records found for {}.", subject);
                return Ok(());
            }

            let mix = cohort::risk_mix(&roster);
            println!(
                "{} roster: {} high, {} medium, {} low risk",
                subject, mix.high, mix.medium, mix.low
            );
            for summary in roster.iter().take(limit) {
                println!("- {}", report::format_summary(summary));
            }
        }
        Commands::History {
            student_id,
            subject,
        } => {
            let mut records = backend.by_student(student_id).await?;
            if let Some(subject) = subject {
                records.retain(|record| record.subject == subject);
            }

            let Some(profile) = cohort::student_profile(student_id, &records) else {
                println!("No records found for student #{}.", student_id);
                return Ok(());
            };

            println!(
                "Student #{}: {} risk, mood {}/10 now, avg mood {:.1}, \
                 avg stress {:.2}, avg sleep {:.1}h over {} records",
                profile.student_id,
                profile.latest.risk_level,
                profile.latest.mood_score,
                profile.average_mood,
                profile.average_stress,
                profile.average_sleep,
                profile.record_count
            );
            for record in &records {
                println!(
                    "- {} {} ({}) {}: sleep {}h, stress {:.2}, mood {}, {} risk",
                    record.date,
                    record.subject,
                    record.class_time,
                    record.attendance_status,
                    record.sleep_hours,
                    record.stress_level,
                    record.mood_score,
                    record.risk_level
                );
            }
        }
        Commands::Report {
            subject,
            out,
            narrate,
        } => {
            let records = backend.by_subject(subject).await?;
            let narratives = if narrate > 0 {
                request_narratives(&config, &records, narrate).await
            } else {
                Vec::new()
            };

            let report =
                report::build_report(subject, Utc::now().date_naive(), &records, &narratives);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn request_narratives(
    config: &Config,
    records: &[StudentRecord],
    count: usize,
) -> Vec<(i64, Narrative)> {
    let roster = cohort::summarize(records);
    let targets: Vec<i64> = roster.iter().take(count).map(|s| s.student_id).collect();

    let narrator = match GeminiNarrator::new(&config.narrative) {
        Ok(narrator) => narrator,
        Err(err) => {
            tracing::warn!(error = %err, "narratives skipped");
            return targets
                .into_iter()
                .map(|id| (id, Narrative::Unavailable(err.to_string())))
                .collect();
        }
    };

    let mut narratives = Vec::with_capacity(targets.len());
    for student_id in targets {
        let history: Vec<StudentRecord> = records
            .iter()
            .filter(|record| record.student_id == student_id)
            .cloned()
            .collect();
        let narrative = narrative::narrate_with_fallback(
            narrator.summarize(student_id, &history),
            config.narrative.timeout,
        )
        .await;
        narratives.push((student_id, narrative));
    }
    narratives
}
