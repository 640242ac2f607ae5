use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    Form,
};
use serde::Deserialize;
use serde_json::json;

use super::{page, AppState};
use crate::extractors::extract_video_id;
use crate::transcribe::{fetch_transcript, fetch_transcript_text};
use crate::TranscriptorError;

/// Shown on the form when no video id could be found
pub const FORM_INVALID_URL: &str = "⚠️ Invalid YouTube URL!";

pub const MISSING_URL_PARAMETER: &str = "Missing 'url' parameter";

#[derive(Debug, Deserialize)]
pub struct TranscriptForm {
    #[serde(default)]
    pub youtube_url: Option<String>,
}

/// Render the empty form
pub async fn index() -> Html<String> {
    Html(page::render(None))
}

/// Handle a form submission
pub async fn submit(State(state): State<AppState>, Form(form): Form<TranscriptForm>) -> Html<String> {
    let url = form.youtube_url.unwrap_or_default();

    let outcome = match extract_video_id(&url) {
        Some(video_id) => {
            let text =
                fetch_transcript_text(state.provider.as_ref(), &video_id, &state.language).await;
            page::Outcome::Transcript(text)
        }
        None => {
            tracing::debug!("Form submitted without a video id: {:?}", url);
            page::Outcome::Error(FORM_INVALID_URL.to_string())
        }
    };

    Html(page::render(Some(&outcome)))
}

/// `GET /api/transcript?url=<URL>`
pub async fn api_transcript(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Response {
    let url = match query.as_deref().and_then(first_url_parameter) {
        Some(url) if !url.is_empty() => url,
        _ => return error_response(StatusCode::BAD_REQUEST, MISSING_URL_PARAMETER),
    };

    let Some(video_id) = extract_video_id(&url) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            &TranscriptorError::ExtractionFailure.to_string(),
        );
    };

    match fetch_transcript(state.provider.as_ref(), &video_id, &state.language).await {
        Ok(transcript) => Json(json!({ "transcript": transcript })).into_response(),
        Err(err) if state.strict_api_errors => {
            error_response(StatusCode::BAD_GATEWAY, &err.to_string())
        }
        // Failed fetches stay a 200 with the message in place of the transcript
        Err(err) => Json(json!({ "transcript": err.to_string() })).into_response(),
    }
}

/// First `url` value of a query string. Parsing never fails, so repeated or
/// malformed parameters still get a JSON answer.
fn first_url_parameter(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
