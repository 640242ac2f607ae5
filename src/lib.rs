//! Transcript Fetcher - pull caption transcripts for YouTube videos
//!
//! This library locates a video id inside an arbitrary URL and retrieves the
//! video's captions from a transcript provider, flattened into a single string.
//! The same core is served over a web form, a JSON API and the command line.

pub mod cli;
pub mod config;
pub mod extractors;
pub mod output;
pub mod server;
pub mod transcribe;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{extract_video_id, VideoId};
pub use transcribe::{
    fetch_transcript, fetch_transcript_text, ProviderError, TranscriptProvider, TranscriptSegment,
    DEFAULT_LANGUAGE,
};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Outcome kinds of a transcript request.
///
/// The `Display` output of each variant is the exact text shown to users, so
/// the HTML and JSON surfaces only ever need `to_string()`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptorError {
    /// No 11-character video id was found in the supplied text.
    #[error("Invalid YouTube URL")]
    ExtractionFailure,

    #[error("Error: Transcripts are disabled for this video.")]
    TranscriptsDisabled,

    /// Any other provider fault; carries the fault's own text.
    #[error("Error fetching transcript: {0}")]
    OtherFetchFailure(String),
}
