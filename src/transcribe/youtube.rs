use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::{ProviderError, TranscriptProvider, TranscriptSegment};
use crate::config::ProviderConfig;
use crate::extractors::VideoId;

const YOUTUBE_BASE_URL: &str = "https://www.youtube.com/";
const WATCH_PATH: &str = "watch";
const INNERTUBE_PLAYER_PATH: &str = "youtubei/v1/player";
const CONSENT_FORM_MARKER: &str = "action=\"https://consent.youtube.com/s\"";

static API_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("api key pattern is valid")
});

static CONSENT_VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"name="v" value="(.*?)""#).expect("consent pattern is valid"));

// Self-closing elements have no second group
static TEXT_ELEMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<text\b([^>]*?)(?:/>|>(.*?)</text>)").expect("text element pattern is valid")
});

static ATTRIBUTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([a-zA-Z_:-]+)="([^"]*)""#).expect("attribute pattern is valid"));

static MARKUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("markup pattern is valid"));

/// Transcript provider that scrapes captions from youtube.com
pub struct YoutubeProvider {
    client: reqwest::Client,
    base_url: Url,
}

impl YoutubeProvider {
    pub fn new(config: &ProviderConfig) -> crate::Result<Self> {
        Self::with_base_url(config, YOUTUBE_BASE_URL)
    }

    /// Talk to a YouTube-compatible host other than youtube.com
    pub fn with_base_url(config: &ProviderConfig, base_url: &str) -> crate::Result<Self> {
        // Paths are joined onto the base, so it must end in a slash
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            client: client_builder(config)?.build()?,
            base_url: Url::parse(&base)?,
        })
    }

    fn endpoint(&self, video_id: &VideoId, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| unparsable(video_id, &e.to_string()))
    }

    fn watch_url(&self, video_id: &VideoId) -> Result<Url, ProviderError> {
        let mut url = self.endpoint(video_id, WATCH_PATH)?;
        url.query_pairs_mut().append_pair("v", video_id.as_str());
        Ok(url)
    }

    async fn fetch_video_html(&self, video_id: &VideoId) -> Result<String, ProviderError> {
        let url = self.watch_url(video_id)?;
        tracing::debug!("Fetching watch page: {}", url);

        let response = self.client.get(url.clone()).send().await?;
        check_status(&response, video_id)?;
        let html = response.text().await?;

        if !html.contains(CONSENT_FORM_MARKER) {
            return Ok(html);
        }

        // EU consent wall: accept it once and load the page again
        let consent = CONSENT_VALUE_RE
            .captures(&html)
            .and_then(|captures| captures.get(1))
            .map(|value| format!("CONSENT=YES+{}", value.as_str()))
            .ok_or_else(|| unparsable(video_id, "consent form without a value"))?;

        tracing::debug!("Accepting consent form for video {}", video_id);
        let response = self
            .client
            .get(url)
            .header(header::COOKIE, consent)
            .send()
            .await?;
        check_status(&response, video_id)?;
        let html = response.text().await?;

        if html.contains(CONSENT_FORM_MARKER) {
            return Err(unparsable(video_id, "consent form was not accepted"));
        }

        Ok(html)
    }

    async fn fetch_player_data(
        &self,
        video_id: &VideoId,
        api_key: &str,
    ) -> Result<Value, ProviderError> {
        let mut url = self.endpoint(video_id, INNERTUBE_PLAYER_PATH)?;
        url.query_pairs_mut().append_pair("key", api_key);

        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": "ANDROID",
                    "clientVersion": "20.10.38"
                }
            },
            "videoId": video_id.as_str()
        });

        let response = self.client.post(url).json(&body).send().await?;
        check_status(&response, video_id)?;

        response
            .json()
            .await
            .map_err(|e| unparsable(video_id, &format!("player response: {}", e)))
    }

    async fn fetch_timedtext(
        &self,
        video_id: &VideoId,
        track: &CaptionTrack,
    ) -> Result<String, ProviderError> {
        if track.base_url.contains("&exp=xpe") {
            return Err(ProviderError::PoTokenRequired(video_id.clone()));
        }

        tracing::debug!(
            "Fetching {} captions for video {} (generated: {})",
            track.language_code,
            video_id,
            track.is_generated
        );

        let response = self.client.get(&track.base_url).send().await?;
        check_status(&response, video_id)?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl TranscriptProvider for YoutubeProvider {
    async fn get_transcript(
        &self,
        video_id: &VideoId,
        language: &str,
    ) -> Result<Vec<TranscriptSegment>, ProviderError> {
        let html = self.fetch_video_html(video_id).await?;
        let api_key = extract_innertube_api_key(&html, video_id)?;
        let player = self.fetch_player_data(video_id, &api_key).await?;

        assert_playability(video_id, &player)?;
        let tracks = caption_tracks(video_id, &player)?;
        let track = select_track(&tracks, video_id, language)?;

        let xml = self.fetch_timedtext(video_id, track).await?;
        let segments = parse_timedtext(&xml);
        tracing::debug!("Parsed {} caption segments for video {}", segments.len(), video_id);

        Ok(segments)
    }
}

/// One caption track advertised by the player response
#[derive(Debug, Clone, PartialEq)]
struct CaptionTrack {
    language_code: String,
    base_url: String,
    is_generated: bool,
}

fn client_builder(config: &ProviderConfig) -> crate::Result<reqwest::ClientBuilder> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_str(&config.accept_language)?,
    );

    let mut builder = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers);

    if let Some(secs) = config.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    Ok(builder)
}

fn unparsable(video_id: &VideoId, reason: &str) -> ProviderError {
    ProviderError::Unparsable {
        video_id: video_id.clone(),
        reason: reason.to_string(),
    }
}

fn check_status(response: &reqwest::Response, video_id: &VideoId) -> Result<(), ProviderError> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::TooManyRequests(video_id.clone()));
    }
    if !status.is_success() {
        return Err(ProviderError::HttpStatus(status.as_u16()));
    }
    Ok(())
}

fn extract_innertube_api_key(html: &str, video_id: &VideoId) -> Result<String, ProviderError> {
    if html.contains("class=\"g-recaptcha\"") {
        return Err(ProviderError::RequestBlocked(video_id.clone()));
    }

    API_KEY_RE
        .captures(html)
        .and_then(|captures| captures.get(1))
        .map(|key| key.as_str().to_string())
        .ok_or_else(|| unparsable(video_id, "INNERTUBE_API_KEY not found in watch page"))
}

fn assert_playability(video_id: &VideoId, player: &Value) -> Result<(), ProviderError> {
    let Some(playability) = player.get("playabilityStatus") else {
        return Ok(());
    };

    let status = playability["status"].as_str().unwrap_or("");
    if status == "OK" {
        return Ok(());
    }

    let reason = playability["reason"].as_str().unwrap_or("");
    match status {
        "LOGIN_REQUIRED" if reason.contains("not a bot") => {
            Err(ProviderError::RequestBlocked(video_id.clone()))
        }
        "LOGIN_REQUIRED" if reason.contains("inappropriate for some users") => {
            Err(ProviderError::AgeRestricted(video_id.clone()))
        }
        "ERROR" if reason.contains("unavailable") => {
            Err(ProviderError::VideoUnavailable(video_id.clone()))
        }
        _ => Err(ProviderError::VideoUnplayable {
            video_id: video_id.clone(),
            reason: reason.to_string(),
        }),
    }
}

fn caption_tracks(video_id: &VideoId, player: &Value) -> Result<Vec<CaptionTrack>, ProviderError> {
    let tracks: Vec<CaptionTrack> = player
        .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")
        .and_then(Value::as_array)
        .map(|tracks| {
            tracks
                .iter()
                .filter_map(|track| {
                    let language_code = track["languageCode"].as_str()?.to_string();
                    let base_url = track["baseUrl"].as_str()?.replace("&fmt=srv3", "");
                    let is_generated = track["kind"].as_str() == Some("asr");
                    Some(CaptionTrack {
                        language_code,
                        base_url,
                        is_generated,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    if tracks.is_empty() {
        return Err(ProviderError::TranscriptsDisabled(video_id.clone()));
    }

    Ok(tracks)
}

/// Manually created captions take precedence over generated ones.
fn select_track<'a>(
    tracks: &'a [CaptionTrack],
    video_id: &VideoId,
    language: &str,
) -> Result<&'a CaptionTrack, ProviderError> {
    let mut candidates = tracks.iter().filter(|track| track.language_code == language);
    let manual = candidates.clone().find(|track| !track.is_generated);

    manual
        .or_else(|| candidates.next())
        .ok_or_else(|| ProviderError::NoTranscriptFound {
            video_id: video_id.clone(),
            languages: vec![language.to_string()],
        })
}

/// Parse the timed-text XML format into segments.
fn parse_timedtext(xml: &str) -> Vec<TranscriptSegment> {
    TEXT_ELEMENT_RE
        .captures_iter(xml)
        .filter_map(|element| {
            let raw = element.get(2)?.as_str();
            if raw.is_empty() {
                return None;
            }

            let mut start = 0.0;
            let mut duration = 0.0;
            let attributes = element.get(1).map_or("", |attrs| attrs.as_str());
            for attribute in ATTRIBUTE_RE.captures_iter(attributes) {
                let value: f64 = attribute[2].parse().unwrap_or(0.0);
                match &attribute[1] {
                    "start" => start = value,
                    "dur" => duration = value,
                    _ => {}
                }
            }

            // Entities arrive escaped twice: once by XML, once by the caption body
            let once = html_escape::decode_html_entities(raw);
            let twice = html_escape::decode_html_entities(&once);
            let text = MARKUP_RE.replace_all(&twice, "").into_owned();

            Some(TranscriptSegment::new(text, start, duration))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn video_id() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    #[test]
    fn test_parse_timedtext() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript>
<text start="0.5" dur="1.54">Hey there</text>
<text start="2.04" dur="2">how&amp;#39;s it going</text>
<text start="4.1">&lt;i&gt;music&lt;/i&gt;</text>
<text start="5" dur="1"/>
<text start="6" dur="1"></text>
<text start="7" dur="0.5">bye</text>
</transcript>"#;

        let segments = parse_timedtext(xml);
        assert_eq!(
            segments,
            vec![
                TranscriptSegment::new("Hey there", 0.5, 1.54),
                TranscriptSegment::new("how's it going", 2.04, 2.0),
                TranscriptSegment::new("music", 4.1, 0.0),
                TranscriptSegment::new("bye", 7.0, 0.5),
            ]
        );
    }

    #[test]
    fn test_parse_timedtext_multiline_text() {
        let xml = "<transcript><text start=\"1\" dur=\"2\">line one\nline two</text></transcript>";
        let segments = parse_timedtext(xml);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "line one\nline two");
    }

    #[test]
    fn test_extract_innertube_api_key() {
        let html = r#"<script>ytcfg.set({"INNERTUBE_API_KEY": "AIzaSy_test-KEY123"})</script>"#;
        assert_eq!(
            extract_innertube_api_key(html, &video_id()).unwrap(),
            "AIzaSy_test-KEY123"
        );

        assert!(matches!(
            extract_innertube_api_key("<html></html>", &video_id()),
            Err(ProviderError::Unparsable { .. })
        ));
        assert!(matches!(
            extract_innertube_api_key(r#"<div class="g-recaptcha"></div>"#, &video_id()),
            Err(ProviderError::RequestBlocked(_))
        ));
    }

    #[test]
    fn test_assert_playability() {
        assert!(assert_playability(&video_id(), &json!({})).is_ok());
        assert!(assert_playability(&video_id(), &json!({"playabilityStatus": {"status": "OK"}})).is_ok());

        let unavailable = json!({"playabilityStatus": {"status": "ERROR", "reason": "Video unavailable"}});
        assert!(matches!(
            assert_playability(&video_id(), &unavailable),
            Err(ProviderError::VideoUnavailable(_))
        ));

        let bot = json!({"playabilityStatus": {
            "status": "LOGIN_REQUIRED",
            "reason": "Sign in to confirm you're not a bot"
        }});
        assert!(matches!(
            assert_playability(&video_id(), &bot),
            Err(ProviderError::RequestBlocked(_))
        ));

        let age = json!({"playabilityStatus": {
            "status": "LOGIN_REQUIRED",
            "reason": "This video may be inappropriate for some users."
        }});
        assert!(matches!(
            assert_playability(&video_id(), &age),
            Err(ProviderError::AgeRestricted(_))
        ));

        let private = json!({"playabilityStatus": {"status": "UNPLAYABLE", "reason": "Private video"}});
        match assert_playability(&video_id(), &private) {
            Err(ProviderError::VideoUnplayable { reason, .. }) => assert_eq!(reason, "Private video"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_caption_tracks_missing_means_disabled() {
        let err = caption_tracks(&video_id(), &json!({"playabilityStatus": {"status": "OK"}}))
            .unwrap_err();
        assert!(err.is_transcripts_disabled());

        let empty = json!({"captions": {"playerCaptionsTracklistRenderer": {"captionTracks": []}}});
        assert!(caption_tracks(&video_id(), &empty).unwrap_err().is_transcripts_disabled());
    }

    #[test]
    fn test_select_track_prefers_manual_captions() {
        let player = json!({"captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
            {"languageCode": "en", "kind": "asr", "baseUrl": "https://example.com/en-asr&fmt=srv3"},
            {"languageCode": "en", "baseUrl": "https://example.com/en"},
            {"languageCode": "es", "kind": "asr", "baseUrl": "https://example.com/es-asr"},
            {"baseUrl": "https://example.com/no-language"}
        ]}}});

        let tracks = caption_tracks(&video_id(), &player).unwrap();
        assert_eq!(tracks.len(), 3);
        assert_eq!(tracks[0].base_url, "https://example.com/en-asr");

        let en = select_track(&tracks, &video_id(), "en").unwrap();
        assert_eq!(en.base_url, "https://example.com/en");
        assert!(!en.is_generated);

        let es = select_track(&tracks, &video_id(), "es").unwrap();
        assert!(es.is_generated);

        match select_track(&tracks, &video_id(), "fr") {
            Err(ProviderError::NoTranscriptFound { languages, .. }) => assert_eq!(languages, vec!["fr"]),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_watch_url() {
        let provider = YoutubeProvider::new(&ProviderConfig::default()).unwrap();
        assert_eq!(
            provider.watch_url(&video_id()).unwrap().as_str(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );

        let mirror =
            YoutubeProvider::with_base_url(&ProviderConfig::default(), "http://127.0.0.1:9/yt").unwrap();
        assert_eq!(
            mirror.watch_url(&video_id()).unwrap().as_str(),
            "http://127.0.0.1:9/yt/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            mirror.endpoint(&video_id(), INNERTUBE_PLAYER_PATH).unwrap().as_str(),
            "http://127.0.0.1:9/yt/youtubei/v1/player"
        );
    }

    #[test]
    fn test_new_applies_config() {
        let config = ProviderConfig {
            request_timeout_secs: Some(5),
            ..ProviderConfig::default()
        };
        assert!(YoutubeProvider::new(&config).is_ok());

        let bad = ProviderConfig {
            accept_language: "en\nUS".to_string(),
            ..ProviderConfig::default()
        };
        assert!(YoutubeProvider::new(&bad).is_err());
    }

    mod served {
        //! Drives the provider against a local stand-in for youtube.com

        use super::*;
        use axum::extract::{Query, State};
        use axum::http::{header::COOKIE, HeaderMap, StatusCode};
        use axum::response::{Html, IntoResponse, Response};
        use axum::routing::{get, post};
        use axum::{Json, Router};
        use std::collections::HashMap;
        use tokio::net::TcpListener;

        const API_KEY: &str = "AIzaFakeKey";
        const CONSENT_COOKIE: &str = "CONSENT=YES+cb.20240101";

        const WATCH_HTML: &str =
            r#"<html><script>ytcfg.set({"INNERTUBE_API_KEY": "AIzaFakeKey"});</script></html>"#;

        const CONSENT_HTML: &str = r#"<html><form action="https://consent.youtube.com/s" method="POST">
<input type="hidden" name="v" value="cb.20240101"></form></html>"#;

        const TIMEDTEXT_XML: &str = r#"<?xml version="1.0" encoding="utf-8" ?><transcript>
<text start="0" dur="1.5">Never gonna</text>
<text start="1.5" dur="2">give you up</text>
</transcript>"#;

        #[derive(Clone, Copy)]
        enum Watch {
            Page,
            Status(u16),
            ConsentOnce,
            ConsentAlways,
        }

        #[derive(Clone)]
        struct FakeYoutube {
            watch: Watch,
            player: Value,
        }

        async fn watch_page(
            State(fake): State<FakeYoutube>,
            Query(query): Query<HashMap<String, String>>,
            headers: HeaderMap,
        ) -> Response {
            if query.get("v").map(String::as_str) != Some("dQw4w9WgXcQ") {
                return StatusCode::NOT_FOUND.into_response();
            }

            let accepted = headers.get(COOKIE).and_then(|value| value.to_str().ok())
                == Some(CONSENT_COOKIE);

            match fake.watch {
                Watch::Status(code) => StatusCode::from_u16(code).unwrap().into_response(),
                Watch::ConsentOnce if !accepted => Html(CONSENT_HTML).into_response(),
                Watch::ConsentAlways => Html(CONSENT_HTML).into_response(),
                Watch::Page | Watch::ConsentOnce => Html(WATCH_HTML).into_response(),
            }
        }

        async fn player(
            State(fake): State<FakeYoutube>,
            Query(query): Query<HashMap<String, String>>,
            Json(body): Json<Value>,
        ) -> Response {
            let key_ok = query.get("key").map(String::as_str) == Some(API_KEY);
            let client_ok = body["context"]["client"]["clientName"] == "ANDROID";
            if !key_ok || !client_ok || body["videoId"] != "dQw4w9WgXcQ" {
                return StatusCode::BAD_REQUEST.into_response();
            }
            Json(fake.player).into_response()
        }

        async fn timedtext(Query(query): Query<HashMap<String, String>>) -> Response {
            // The srv3 format flag must have been dropped from the track URL
            if query.contains_key("fmt") || query.get("lang").map(String::as_str) != Some("en") {
                return StatusCode::BAD_REQUEST.into_response();
            }
            TIMEDTEXT_XML.into_response()
        }

        fn player_with_track(base: &str, extra_query: &str) -> Value {
            json!({
                "playabilityStatus": {"status": "OK"},
                "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [{
                    "languageCode": "en",
                    "baseUrl": format!("{}api/timedtext?v=dQw4w9WgXcQ&lang=en{}", base, extra_query)
                }]}}
            })
        }

        async fn serve_fake(watch: Watch, player_json: impl FnOnce(&str) -> Value) -> YoutubeProvider {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = format!("http://{}/", listener.local_addr().unwrap());

            let fake = FakeYoutube {
                watch,
                player: player_json(&base),
            };
            let app = Router::new()
                .route("/watch", get(watch_page))
                .route("/youtubei/v1/player", post(player))
                .route("/api/timedtext", get(timedtext))
                .with_state(fake);

            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            // Bypass any proxy from the environment for the loopback server
            let client = client_builder(&ProviderConfig::default())
                .unwrap()
                .no_proxy()
                .build()
                .unwrap();
            YoutubeProvider {
                client,
                base_url: Url::parse(&base).unwrap(),
            }
        }

        #[tokio::test]
        async fn test_watch_player_timedtext_sequence() {
            let provider = serve_fake(Watch::Page, |base| player_with_track(base, "&fmt=srv3")).await;

            let segments = provider.get_transcript(&video_id(), "en").await.unwrap();
            assert_eq!(
                segments,
                vec![
                    TranscriptSegment::new("Never gonna", 0.0, 1.5),
                    TranscriptSegment::new("give you up", 1.5, 2.0),
                ]
            );
        }

        #[tokio::test]
        async fn test_missing_language_is_not_found() {
            let provider = serve_fake(Watch::Page, |base| player_with_track(base, "")).await;

            assert!(matches!(
                provider.get_transcript(&video_id(), "de").await,
                Err(ProviderError::NoTranscriptFound { .. })
            ));
        }

        #[tokio::test]
        async fn test_player_without_captions_is_disabled() {
            let provider =
                serve_fake(Watch::Page, |_| json!({"playabilityStatus": {"status": "OK"}})).await;

            let err = provider.get_transcript(&video_id(), "en").await.unwrap_err();
            assert!(err.is_transcripts_disabled());
        }

        #[tokio::test]
        async fn test_too_many_requests() {
            let provider = serve_fake(Watch::Status(429), |base| player_with_track(base, "")).await;

            assert!(matches!(
                provider.get_transcript(&video_id(), "en").await,
                Err(ProviderError::TooManyRequests(_))
            ));
        }

        #[tokio::test]
        async fn test_other_status_codes() {
            let provider = serve_fake(Watch::Status(503), |base| player_with_track(base, "")).await;

            assert!(matches!(
                provider.get_transcript(&video_id(), "en").await,
                Err(ProviderError::HttpStatus(503))
            ));
        }

        #[tokio::test]
        async fn test_po_token_track_is_rejected() {
            let provider = serve_fake(Watch::Page, |base| player_with_track(base, "&exp=xpe")).await;

            assert!(matches!(
                provider.get_transcript(&video_id(), "en").await,
                Err(ProviderError::PoTokenRequired(_))
            ));
        }

        #[tokio::test]
        async fn test_consent_is_accepted_and_page_refetched() {
            let provider = serve_fake(Watch::ConsentOnce, |base| player_with_track(base, "")).await;

            let segments = provider.get_transcript(&video_id(), "en").await.unwrap();
            assert_eq!(segments.len(), 2);
            assert_eq!(segments[0].text, "Never gonna");
        }

        #[tokio::test]
        async fn test_consent_that_never_clears() {
            let provider = serve_fake(Watch::ConsentAlways, |base| player_with_track(base, "")).await;

            match provider.get_transcript(&video_id(), "en").await {
                Err(ProviderError::Unparsable { reason, .. }) => {
                    assert_eq!(reason, "consent form was not accepted")
                }
                other => panic!("unexpected result: {:?}", other),
            }
        }
    }
}
