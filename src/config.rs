use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

const DEFAULT_DATA_FILE: &str = "silent_signals_data.json";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_NARRATIVE_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Postgres connection string. Without it records live in `data_file`.
    pub database_url: Option<String>,
    pub data_file: PathBuf,
    pub narrative: NarrativeConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let timeout_secs = match get("NARRATIVE_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .with_context(|| {
                    format!("NARRATIVE_TIMEOUT_SECS must be a positive integer, got {raw:?}")
                })?,
            None => DEFAULT_NARRATIVE_TIMEOUT_SECS,
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            data_file: get("SIGNALS_DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE)),
            narrative: NarrativeConfig {
                api_key: get("GEMINI_API_KEY"),
                model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                base_url: get("GEMINI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }
}
