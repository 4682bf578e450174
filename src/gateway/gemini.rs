//! Gemini (Google) gateway: image edits and chat via `generateContent`,
//! video via Veo `predictLongRunning`.

use crate::config::{
    missing_api_key, resolve_api_key, StudioConfig, DEFAULT_CHAT_MODEL, DEFAULT_IMAGE_MODEL,
    DEFAULT_VIDEO_MODEL,
};
use crate::error::{parse_retry_after, sanitize_error_message, Result, StudioError};
use crate::gateway::{ChatSessionId, Gateway};
use crate::image::ImageAsset;
use crate::video::{JobHandle, VideoRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Builder for GeminiGateway.
#[derive(Debug, Clone, Default)]
pub struct GeminiGatewayBuilder {
    api_key: Option<String>,
    image_model: Option<String>,
    chat_model: Option<String>,
    video_model: Option<String>,
    base_url: Option<String>,
}

impl GeminiGatewayBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the builder from a resolved configuration.
    pub fn from_config(config: &StudioConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            image_model: Some(config.image_model.clone()),
            chat_model: Some(config.chat_model.clone()),
            video_model: Some(config.video_model.clone()),
            base_url: None,
        }
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY`, `GEMINI_API_KEY`, `API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the model used for image edits.
    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = Some(model.into());
        self
    }

    /// Sets the model used for chat.
    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = Some(model.into());
        self
    }

    /// Sets the Veo model used for video jobs.
    pub fn video_model(mut self, model: impl Into<String>) -> Self {
        self.video_model = Some(model.into());
        self
    }

    /// Overrides the API root (proxies, test servers).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the gateway, resolving the API key.
    pub fn build(self) -> Result<GeminiGateway> {
        let api_key = resolve_api_key(self.api_key).ok_or_else(missing_api_key)?;

        Ok(GeminiGateway {
            client: reqwest::Client::new(),
            api_key,
            image_model: self
                .image_model
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            chat_model: self
                .chat_model
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            video_model: self
                .video_model
                .unwrap_or_else(|| DEFAULT_VIDEO_MODEL.to_string()),
            base_url: self
                .base_url
                .unwrap_or_else(|| API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            conversations: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(1),
        })
    }
}

/// Gateway backed by the Gemini Developer API.
pub struct GeminiGateway {
    client: reqwest::Client,
    api_key: String,
    image_model: String,
    chat_model: String,
    video_model: String,
    base_url: String,
    /// Turns exchanged so far, per open conversation.
    conversations: Mutex<HashMap<ChatSessionId, Vec<Content>>>,
    next_session: AtomicU64,
}

impl GeminiGateway {
    /// Creates a new `GeminiGatewayBuilder`.
    pub fn builder() -> GeminiGatewayBuilder {
        GeminiGatewayBuilder::new()
    }

    async fn generate_content(&self, model: &str, body: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        Ok(response.json().await?)
    }

    /// Appends the API key to an asset location, as the download endpoint requires.
    fn authorized_asset_url(&self, uri: &str) -> String {
        if uri.contains('?') {
            format!("{}&key={}", uri, self.api_key)
        } else {
            format!("{}?key={}", uri, self.api_key)
        }
    }

    fn parse_error(
        &self,
        status: u16,
        text: &str,
        headers: &reqwest::header::HeaderMap,
    ) -> StudioError {
        let message = serde_json::from_str::<ErrorEnvelope>(text)
            .ok()
            .and_then(|e| e.error.message)
            .unwrap_or_else(|| text.to_string());
        let message = sanitize_error_message(&message);

        if crate::error::is_invalid_credential_message(&message) {
            return StudioError::InvalidCredential(message);
        }
        if status == 401 || status == 403 {
            return StudioError::Auth(message);
        }
        if status == 429 {
            let hint = parse_retry_after(headers)
                .map(|secs| format!(" (retry after {secs}s)"))
                .unwrap_or_default();
            return StudioError::Gateway {
                status,
                message: format!("rate limited{hint}: {message}"),
            };
        }
        StudioError::Gateway { status, message }
    }
}

/// Pulls the single image part out of an edit response.
fn extract_image(response: GenerateContentResponse) -> Result<ImageAsset> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(StudioError::GenerationFailed(format!(
            "prompt blocked: {reason}"
        )));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(StudioError::ResultMissing)?;

    if let Some(ref finish_reason) = candidate.finish_reason {
        match finish_reason.as_str() {
            "SAFETY" | "IMAGE_SAFETY" | "IMAGE_PROHIBITED_CONTENT" | "PROHIBITED_CONTENT"
            | "BLOCKLIST" | "RECITATION" | "IMAGE_RECITATION" => {
                return Err(StudioError::GenerationFailed(format!(
                    "blocked by safety filter: {finish_reason}"
                )));
            }
            _ => {}
        }
    }

    let inline = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .find_map(|p| p.inline_data)
        .ok_or(StudioError::ResultMissing)?;

    ImageAsset::from_base64(&inline.data, &inline.mime_type)
}

/// Concatenates the text parts of a chat reply.
fn extract_text(response: GenerateContentResponse) -> Result<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    if text.trim().is_empty() {
        return Err(StudioError::ResultMissing);
    }
    Ok(text)
}

#[async_trait]
impl Gateway for GeminiGateway {
    async fn edit_image(&self, image: &ImageAsset, prompt: &str) -> Result<ImageAsset> {
        let start = Instant::now();
        let body = GenerateContentRequest::image_edit(image, prompt);
        let response = self.generate_content(&self.image_model, &body).await?;
        let edited = extract_image(response)?;
        tracing::debug!(
            model = %self.image_model,
            duration_ms = start.elapsed().as_millis() as u64,
            mime = edited.mime_type(),
            "image edit complete"
        );
        Ok(edited)
    }

    async fn start_chat(&self) -> Result<ChatSessionId> {
        let id = ChatSessionId(self.next_session.fetch_add(1, Ordering::SeqCst));
        self.conversations.lock().await.insert(id, Vec::new());
        tracing::debug!(session = %id, model = %self.chat_model, "opened chat session");
        Ok(id)
    }

    async fn chat_turn(&self, session: &ChatSessionId, text: &str) -> Result<String> {
        let user = Content::text("user", text);
        let mut contents = self
            .conversations
            .lock()
            .await
            .get(session)
            .cloned()
            .ok_or_else(|| StudioError::ChatError(format!("unknown chat session {session}")))?;
        contents.push(user.clone());

        let body = GenerateContentRequest {
            contents,
            generation_config: None,
        };
        let reply = extract_text(self.generate_content(&self.chat_model, &body).await?)?;

        // Only completed turns become part of the conversation memory.
        if let Some(history) = self.conversations.lock().await.get_mut(session) {
            history.push(user);
            history.push(Content::text("model", &reply));
        }
        Ok(reply)
    }

    async fn submit_video_job(&self, request: &VideoRequest) -> Result<JobHandle> {
        let url = format!(
            "{}/models/{}:predictLongRunning",
            self.base_url, self.video_model
        );
        let body = VeoRequest::from_request(request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let operation: VeoOperationResponse = response.json().await?;
        Ok(operation.into_handle())
    }

    async fn poll_job(&self, handle: &JobHandle) -> Result<JobHandle> {
        let url = format!("{}/{}", self.base_url, handle.name);

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let operation: VeoOperationResponse = response.json().await?;
        Ok(operation.into_handle())
    }

    async fn fetch_asset(&self, uri: &str) -> Result<Vec<u8>> {
        if uri.starts_with("gs://") {
            return Err(StudioError::GenerationFailed(format!(
                "result stored at a Cloud Storage URI ({uri}) that cannot be fetched directly"
            )));
        }

        let response = self
            .client
            .get(self.authorized_asset_url(uri))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StudioError::DownloadFailed {
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }
}

// ── generateContent wire format ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    fn image_edit(image: &ImageAsset, prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type().to_string(),
                            data: image.to_base64().to_string(),
                        },
                    },
                    Part::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part::Text {
                text: text.to_string(),
            }],
        }
    }
}

/// A request part - text or inline image data.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

// ── Veo wire format ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VeoRequest {
    instances: Vec<VeoInstance>,
    parameters: VeoParameters,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VeoInstance {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<VeoMediaData>,
}

/// Media payload wrapping `inlineData`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VeoMediaData {
    inline_data: InlineData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VeoParameters {
    aspect_ratio: String,
    number_of_videos: u32,
}

impl VeoRequest {
    fn from_request(req: &VideoRequest) -> Self {
        let image = req.starting_image.as_ref().map(|asset| VeoMediaData {
            inline_data: InlineData {
                mime_type: asset.mime_type().to_string(),
                data: asset.to_base64().to_string(),
            },
        });
        Self {
            instances: vec![VeoInstance {
                prompt: req.prompt.clone(),
                image,
            }],
            parameters: VeoParameters {
                aspect_ratio: req.aspect_ratio.as_str().to_string(),
                number_of_videos: 1,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct VeoOperationResponse {
    name: String,
    #[serde(default)]
    done: Option<bool>,
    #[serde(default)]
    response: Option<VeoVideoResponse>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

impl VeoOperationResponse {
    fn into_handle(self) -> JobHandle {
        let result_uri = self
            .response
            .and_then(|r| r.generate_video_response)
            .and_then(|r| r.generated_samples)
            .and_then(|samples| samples.into_iter().next())
            .and_then(|sample| sample.video)
            .and_then(|video| video.uri);
        JobHandle {
            name: self.name,
            done: self.done.unwrap_or(false),
            result_uri,
            error: self
                .error
                .map(|e| e.message.unwrap_or_else(|| "Unknown error".into())),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VeoVideoResponse {
    #[serde(default)]
    generate_video_response: Option<VeoGenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VeoGenerateVideoResponse {
    #[serde(default)]
    generated_samples: Option<Vec<VeoGeneratedSample>>,
}

#[derive(Debug, Deserialize)]
struct VeoGeneratedSample {
    #[serde(default)]
    video: Option<VeoVideo>,
}

#[derive(Debug, Deserialize)]
struct VeoVideo {
    #[serde(default)]
    uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageFormat;
    use crate::video::AspectRatio;

    fn gateway() -> GeminiGateway {
        GeminiGatewayBuilder::new().api_key("test-key").build().unwrap()
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let gw = GeminiGatewayBuilder::new()
            .api_key("test-key")
            .image_model("img")
            .chat_model("chat")
            .video_model("veo")
            .base_url("http://localhost:9000/")
            .build()
            .unwrap();
        assert_eq!(gw.image_model, "img");
        assert_eq!(gw.chat_model, "chat");
        assert_eq!(gw.video_model, "veo");
        assert_eq!(gw.base_url, "http://localhost:9000");
    }

    #[test]
    fn test_builder_from_config() {
        let config = StudioConfig::builder()
            .api_key("cfg-key")
            .video_model("veo-x")
            .build();
        let gw = GeminiGatewayBuilder::from_config(&config).build().unwrap();
        assert_eq!(gw.api_key, "cfg-key");
        assert_eq!(gw.video_model, "veo-x");
        assert_eq!(gw.base_url, API_BASE);
    }

    #[test]
    fn test_authorized_asset_url() {
        let gw = gateway();
        assert_eq!(
            gw.authorized_asset_url("https://x/files/a:download?alt=media"),
            "https://x/files/a:download?alt=media&key=test-key"
        );
        assert_eq!(
            gw.authorized_asset_url("https://x/files/a"),
            "https://x/files/a?key=test-key"
        );
    }

    #[test]
    fn test_image_edit_request_serialization() {
        let asset = ImageAsset::new(vec![1, 2, 3], ImageFormat::Png);
        let req = GenerateContentRequest::image_edit(&asset, "make it blue");
        let json = serde_json::to_value(&req).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["inline_data"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inline_data"]["data"], "AQID");
        assert_eq!(parts[1]["text"], "make it blue");
        assert_eq!(
            json["generationConfig"]["responseModalities"],
            serde_json::json!(["IMAGE", "TEXT"])
        );
    }

    #[test]
    fn test_extract_image_from_response() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here you go"},
                        {"inlineData": {"mimeType": "image/jpeg", "data": "/9j/4AAAAAAAAAAA"}}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let asset = extract_image(resp).unwrap();
        assert_eq!(asset.format(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_extract_image_missing_data() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "no image"}]}}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(extract_image(resp), Err(StudioError::ResultMissing)));
    }

    #[test]
    fn test_extract_image_blocked() {
        let json = r#"{"candidates": [], "promptFeedback": {"blockReason": "SAFETY"}}"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        match extract_image(resp) {
            Err(StudioError::GenerationFailed(msg)) => assert!(msg.contains("SAFETY")),
            other => panic!("Expected GenerationFailed, got: {:?}", other),
        }
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "Hello, "}, {"text": "world"}]}}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(extract_text(resp).unwrap(), "Hello, world");
    }

    #[test]
    fn test_veo_request_with_starting_image() {
        let asset = ImageAsset::new(vec![0xFF, 0xD8, 0xFF], ImageFormat::Jpeg);
        let req = VideoRequest::new("waves", AspectRatio::Portrait).with_starting_image(asset);
        let json = serde_json::to_value(VeoRequest::from_request(&req)).unwrap();

        assert_eq!(json["instances"][0]["prompt"], "waves");
        assert_eq!(
            json["instances"][0]["image"]["inlineData"]["mimeType"],
            "image/jpeg"
        );
        assert_eq!(json["parameters"]["aspectRatio"], "9:16");
        assert_eq!(json["parameters"]["numberOfVideos"], 1);
    }

    #[test]
    fn test_veo_request_without_image() {
        let req = VideoRequest::new("waves", AspectRatio::Landscape);
        let json = serde_json::to_value(VeoRequest::from_request(&req)).unwrap();
        assert!(json["instances"][0]["image"].is_null());
        assert_eq!(json["parameters"]["aspectRatio"], "16:9");
    }

    #[test]
    fn test_operation_not_done() {
        let json = r#"{"name": "operations/123", "done": false}"#;
        let handle = serde_json::from_str::<VeoOperationResponse>(json)
            .unwrap()
            .into_handle();
        assert_eq!(handle.name, "operations/123");
        assert!(!handle.done);
        assert!(handle.result_uri.is_none());
    }

    #[test]
    fn test_operation_done_with_video() {
        let json = r#"{
            "name": "operations/123",
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "generatedSamples": [{"video": {"uri": "https://example.com/video.mp4"}}]
                }
            }
        }"#;
        let handle = serde_json::from_str::<VeoOperationResponse>(json)
            .unwrap()
            .into_handle();
        assert!(handle.done);
        assert_eq!(
            handle.result_uri.as_deref(),
            Some("https://example.com/video.mp4")
        );
    }

    #[test]
    fn test_operation_with_error() {
        let json = r#"{"name": "operations/1", "done": true, "error": {"message": "Quota exceeded"}}"#;
        let handle = serde_json::from_str::<VeoOperationResponse>(json)
            .unwrap()
            .into_handle();
        assert_eq!(handle.error.as_deref(), Some("Quota exceeded"));
    }

    #[test]
    fn test_parse_error_detects_invalid_credential() {
        let gw = gateway();
        let headers = reqwest::header::HeaderMap::new();
        let body = r#"{"error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}}"#;
        let err = gw.parse_error(404, body, &headers);
        assert!(matches!(err, StudioError::InvalidCredential(_)));
    }

    #[test]
    fn test_parse_error_generic() {
        let gw = gateway();
        let headers = reqwest::header::HeaderMap::new();
        match gw.parse_error(500, "boom", &headers) {
            StudioError::Gateway { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("Expected Gateway error, got: {:?}", other),
        }
        assert!(matches!(
            gw.parse_error(403, "denied", &headers),
            StudioError::Auth(_)
        ));
    }

    #[test]
    fn test_gs_uri_is_rejected() {
        let gw = gateway();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let result = rt.block_on(gw.fetch_asset("gs://bucket/video.mp4"));
        assert!(matches!(result, Err(StudioError::GenerationFailed(_))));
    }

    #[test]
    fn test_chat_turn_unknown_session() {
        let gw = gateway();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let result = rt.block_on(gw.chat_turn(&ChatSessionId(999), "hi"));
        assert!(matches!(result, Err(StudioError::ChatError(_))));
    }
}
