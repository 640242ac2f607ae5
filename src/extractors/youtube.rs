use once_cell::sync::Lazy;
use regex::Regex;

use super::VideoId;

/// A `v=` query parameter or a path separator, immediately followed by an id.
static VIDEO_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").expect("video id pattern is valid")
});

/// Find the video id inside a YouTube URL.
///
/// The input is searched rather than parsed, so watch, short (`youtu.be`),
/// embed and shorts links all work, as do strings that are not URLs at all.
/// When several candidates appear the leftmost one wins. Returns `None` when
/// nothing id-shaped follows a `v=` or a `/`.
pub fn extract_video_id(url: &str) -> Option<VideoId> {
    let id = VIDEO_ID_RE.captures(url)?.get(1)?.as_str();
    tracing::debug!("Extracted video id {} from {}", id, url);
    VideoId::parse(id)
}
