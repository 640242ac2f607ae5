use serde::{Deserialize, Serialize};
use std::fmt;

pub mod youtube;

pub use youtube::extract_video_id;

/// Length of every YouTube video id
pub const VIDEO_ID_LEN: usize = 11;

/// An 11-character YouTube video id drawn from `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

impl VideoId {
    /// Validate a bare id. Returns `None` unless the input is exactly an id.
    pub fn parse(input: &str) -> Option<Self> {
        if is_video_id(input) {
            Some(Self(input.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch page URL for this video
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VideoId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_video_id(&value) {
            Ok(Self(value))
        } else {
            Err(format!("not a YouTube video id: {}", value))
        }
    }
}

impl From<VideoId> for String {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

pub(crate) fn is_video_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_video_id(input: &str) -> bool {
    input.len() == VIDEO_ID_LEN && input.chars().all(is_video_id_char)
}
