use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::extractors::VideoId;

/// A transcript fetched from the command line
#[derive(Debug, Clone, Serialize)]
pub struct FetchedTranscript {
    pub video_id: VideoId,
    pub language: String,
    pub transcript: String,
    pub fetched_at: DateTime<Utc>,
}

impl FetchedTranscript {
    pub fn new(video_id: VideoId, language: impl Into<String>, transcript: String) -> Self {
        Self {
            video_id,
            language: language.into(),
            transcript,
            fetched_at: Utc::now(),
        }
    }
}

pub fn format_transcript(result: &FetchedTranscript, format: &OutputFormat) -> Result<String> {
    let content = match format {
        OutputFormat::Text => result.transcript.clone(),
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
    };
    Ok(content)
}

/// Save transcript to file
pub async fn save_to_file(result: &FetchedTranscript, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = format_transcript(result, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print transcript to console
pub fn print_to_console(result: &FetchedTranscript, format: &OutputFormat) -> Result<()> {
    let content = format_transcript(result, format)?;
    println!("{}", content);
    Ok(())
}
