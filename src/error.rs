//! Typed failures for batch sources and the narrative collaborator

use thiserror::Error;

/// A batch source that cannot be read as a sequence of rows at all.
///
/// Individual bad rows are never reported through this type; they are
/// skipped and only show up in the accepted/total tally.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Malformed batch input: {0}")]
    MalformedInput(String),

    #[error("Failed to read batch source: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        IngestError::MalformedInput(err.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::MalformedInput(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("Narrative service not configured: {0}")]
    Unavailable(String),

    #[error("Narrative request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Narrative service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Narrative service returned no text")]
    EmptyResponse,

    #[error("Narrative service timed out after {0}s")]
    Timeout(u64),
}
