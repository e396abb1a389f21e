//! Client for the text-generation service that writes free-text summaries
//! of a student's history.
//!
//! The service is slow and may be down. Callers go through
//! [`narrate_with_fallback`], which never fails, so scoring and rosters
//! are unaffected by whatever happens here.

use std::fmt::Write;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::NarrativeConfig;
use crate::error::NarrativeError;
use crate::models::StudentRecord;

pub const FALLBACK_NOTE: &str = "Review behavioral logs manually.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Narrative {
    Generated(String),
    Unavailable(String),
}

impl Narrative {
    pub fn text(&self) -> String {
        match self {
            Narrative::Generated(text) => text.clone(),
            Narrative::Unavailable(reason) => {
                format!("Narrative unavailable ({reason}). {FALLBACK_NOTE}")
            }
        }
    }
}

#[derive(Serialize, Debug)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize, Debug)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<Content>,
}

pub struct GeminiNarrator {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl GeminiNarrator {
    pub fn new(config: &NarrativeConfig) -> Result<Self, NarrativeError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| {
                NarrativeError::Unavailable("GEMINI_API_KEY is not set".to_string())
            })?;
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
        })
    }

    pub async fn summarize(
        &self,
        student_id: i64,
        history: &[StudentRecord],
    ) -> Result<String, NarrativeError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(build_prompt(student_id, history)),
                }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", &self.api_key)])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NarrativeError::Status { status, body });
        }

        let parsed: GenerateResponse = response.json().await?;
        first_text(parsed).ok_or(NarrativeError::EmptyResponse)
    }
}

fn first_text(response: GenerateResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .filter_map(|part| part.text)
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
}

pub fn build_prompt(student_id: i64, history: &[StudentRecord]) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "Act as an academic mentor and behavioral analyst. Analyze the history of student #{student_id} \
         to identify silent signals of distress."
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Student history:");
    for record in history {
        let _ = writeln!(
            prompt,
            "Date: {}, Status: {}, Stress: {:.2}, Sleep: {}, Mood: {}",
            record.date,
            record.attendance_status,
            record.stress_level,
            record.sleep_hours,
            record.mood_score
        );
    }
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Please provide:");
    let _ = writeln!(
        prompt,
        "1. A concise risk summary relating attendance patterns to sleep quality."
    );
    let _ = writeln!(
        prompt,
        "2. Specific behavioral anomalies, such as late arrivals coinciding with reduced sleep."
    );
    let _ = writeln!(
        prompt,
        "3. An actionable support recommendation focused on routine and reintegration."
    );
    let _ = writeln!(
        prompt,
        "Format the response in markdown. Keep it professional and empathetic."
    );

    prompt
}

pub async fn narrate_with_fallback<F>(request: F, timeout: Duration) -> Narrative
where
    F: Future<Output = Result<String, NarrativeError>>,
{
    let outcome = match tokio::time::timeout(timeout, request).await {
        Ok(result) => result,
        Err(_) => Err(NarrativeError::Timeout(timeout.as_secs())),
    };

    match outcome {
        Ok(text) => Narrative::Generated(text),
        Err(err) => {
            tracing::warn!(error = %err, "narrative generation failed");
            Narrative::Unavailable(err.to_string())
        }
    }
}
