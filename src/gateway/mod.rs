//! Remote AI gateway: the hosted service behind image edits, chat and video jobs.

#[cfg(feature = "gemini")]
mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiGateway, GeminiGatewayBuilder};

use crate::credential::CredentialGate;
use crate::error::{Result, StudioError};
use crate::image::ImageAsset;
use crate::video::{JobHandle, VideoRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque handle to a conversation kept by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatSessionId(pub u64);

impl std::fmt::Display for ChatSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chat-{}", self.0)
    }
}

/// Operations offered by the hosted generative service.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Applies `prompt` to `image` and returns the produced image.
    async fn edit_image(&self, image: &ImageAsset, prompt: &str) -> Result<ImageAsset>;

    /// Opens a conversation whose memory the gateway keeps.
    async fn start_chat(&self) -> Result<ChatSessionId>;

    /// Sends one user turn to an open conversation and returns the reply.
    async fn chat_turn(&self, session: &ChatSessionId, text: &str) -> Result<String>;

    /// Submits a video generation job.
    async fn submit_video_job(&self, request: &VideoRequest) -> Result<JobHandle>;

    /// Re-reads the status of a submitted job.
    async fn poll_job(&self, handle: &JobHandle) -> Result<JobHandle>;

    /// Downloads a generated asset from its location reference.
    async fn fetch_asset(&self, uri: &str) -> Result<Vec<u8>>;

    /// Returns the name of this gateway for display.
    fn name(&self) -> &str;
}

/// Maps a provider failure onto the error the user sees.
///
/// Invalid-key responses reset `gate` and become [`StudioError::InvalidCredential`];
/// other provider responses become [`StudioError::GenerationFailed`].
pub(crate) fn classify_generation_error(err: StudioError, gate: &CredentialGate) -> StudioError {
    if err.is_invalid_credential() {
        gate.invalidate();
        let message = match err {
            StudioError::InvalidCredential(message)
            | StudioError::GenerationFailed(message)
            | StudioError::ChatError(message)
            | StudioError::Gateway { message, .. } => message,
            other => other.to_string(),
        };
        return StudioError::InvalidCredential(message);
    }
    match err {
        StudioError::Gateway { message, .. } => StudioError::GenerationFailed(message),
        other => other,
    }
}
