use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::extractors::VideoId;
use crate::TranscriptorError;

pub mod youtube;

pub use youtube::YoutubeProvider;

/// Language requested when the caller does not name one
pub const DEFAULT_LANGUAGE: &str = "en";

/// Individual caption unit with timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Display text
    pub text: String,

    /// Start time in seconds
    pub start: f64,

    /// Duration in seconds
    pub duration: f64,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }
}

/// Failures reported by a transcript provider
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("Subtitles are disabled for video {0}")]
    TranscriptsDisabled(VideoId),

    #[error("No transcript found for video {video_id} in languages {languages:?}")]
    NoTranscriptFound {
        video_id: VideoId,
        languages: Vec<String>,
    },

    #[error("Video {0} is unavailable")]
    VideoUnavailable(VideoId),

    #[error("Video {video_id} is unplayable: {reason}")]
    VideoUnplayable { video_id: VideoId, reason: String },

    #[error("Video {0} is age restricted")]
    AgeRestricted(VideoId),

    #[error("YouTube is blocking requests for video {0}")]
    RequestBlocked(VideoId),

    #[error("Too many requests while fetching video {0}")]
    TooManyRequests(VideoId),

    #[error("Video {0} requires a PO token to fetch its transcript")]
    PoTokenRequired(VideoId),

    #[error("Could not parse YouTube data for video {video_id}: {reason}")]
    Unparsable { video_id: VideoId, reason: String },

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Fault raised by a provider outside this crate
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    pub fn is_transcripts_disabled(&self) -> bool {
        matches!(self, ProviderError::TranscriptsDisabled(_))
    }
}

impl From<ProviderError> for TranscriptorError {
    fn from(err: ProviderError) -> Self {
        if err.is_transcripts_disabled() {
            TranscriptorError::TranscriptsDisabled
        } else {
            TranscriptorError::OtherFetchFailure(err.to_string())
        }
    }
}

/// Source of caption segments for a video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// Get the ordered caption segments of `video_id` in `language`
    async fn get_transcript(
        &self,
        video_id: &VideoId,
        language: &str,
    ) -> Result<Vec<TranscriptSegment>, ProviderError>;
}

/// Fetch a transcript and flatten it into a single string.
///
/// The provider is called exactly once. Segment texts are joined with one
/// space in provider order. Provider faults are classified into
/// [`TranscriptorError`]; nothing else escapes.
pub async fn fetch_transcript(
    provider: &dyn TranscriptProvider,
    video_id: &VideoId,
    language: &str,
) -> Result<String, TranscriptorError> {
    tracing::info!("Fetching {} transcript for video {}", language, video_id);

    match provider.get_transcript(video_id, language).await {
        Ok(segments) => {
            tracing::debug!("Received {} segments for video {}", segments.len(), video_id);
            Ok(join_segments(&segments))
        }
        Err(err) => {
            tracing::warn!("Transcript fetch failed for video {}: {}", video_id, err);
            Err(err.into())
        }
    }
}

/// Like [`fetch_transcript`], with failures rendered as their message text.
pub async fn fetch_transcript_text(
    provider: &dyn TranscriptProvider,
    video_id: &VideoId,
    language: &str,
) -> String {
    fetch_transcript(provider, video_id, language)
        .await
        .unwrap_or_else(|err| err.to_string())
}

fn join_segments(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|segment| segment.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
