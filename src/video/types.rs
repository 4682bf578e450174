//! Core types for video generation.

use crate::error::{Result, StudioError};
use crate::image::ImageAsset;
use serde::{Deserialize, Serialize};

/// Aspect ratios offered for video jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 16:9 landscape.
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    /// 9:16 portrait.
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    /// Returns the aspect ratio as a string (e.g., "16:9").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AspectRatio {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "16:9" => Ok(Self::Landscape),
            "9:16" => Ok(Self::Portrait),
            other => Err(StudioError::MissingInput(format!(
                "choose an aspect ratio of 16:9 or 9:16 (got {other})"
            ))),
        }
    }
}

/// A request to generate a video.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    /// The text prompt describing the desired video.
    pub prompt: String,
    /// Frame shape.
    pub aspect_ratio: AspectRatio,
    /// Image the video starts from (image-to-video).
    pub starting_image: Option<ImageAsset>,
}

impl VideoRequest {
    /// Creates a new request with the given prompt.
    pub fn new(prompt: impl Into<String>, aspect_ratio: AspectRatio) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio,
            starting_image: None,
        }
    }

    /// Sets a starting image for image-to-video generation.
    pub fn with_starting_image(mut self, image: ImageAsset) -> Self {
        self.starting_image = Some(image);
        self
    }

    /// Rejects requests that should never reach the gateway.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(StudioError::MissingInput("describe the video you want".into()));
        }
        Ok(())
    }
}

/// Refreshable token for an in-flight generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    /// Operation name used to re-query the job.
    pub name: String,
    /// Whether the job reached a terminal state.
    pub done: bool,
    /// Location of the first generated asset, once done.
    pub result_uri: Option<String>,
    /// Provider-side failure message.
    pub error: Option<String>,
}

impl JobHandle {
    /// A handle for a job that is still running.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
            result_uri: None,
            error: None,
        }
    }

    /// A handle for a finished job with an optional result location.
    pub fn finished(name: impl Into<String>, result_uri: Option<String>) -> Self {
        Self {
            name: name.into(),
            done: true,
            result_uri,
            error: None,
        }
    }

    /// A handle for a job the provider reported as failed.
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: true,
            result_uri: None,
            error: Some(message.into()),
        }
    }
}

/// Lifecycle of a video job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted by the gateway.
    Submitted,
    /// Waiting for the gateway to finish.
    Polling,
    /// Result retrieved.
    Done,
    /// Terminal failure.
    Failed,
}

impl JobStatus {
    /// Returns true for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// A video job and its current status. Never persisted.
#[derive(Debug, Clone)]
pub struct VideoJob {
    /// What was asked for.
    pub request: VideoRequest,
    /// Where the job is in its lifecycle.
    pub status: JobStatus,
}

impl VideoJob {
    /// Creates a job for `request` in the `Submitted` state.
    pub fn new(request: VideoRequest) -> Self {
        Self {
            request,
            status: JobStatus::Submitted,
        }
    }
}

/// Metadata about the video generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Operation name reported by the gateway.
    pub operation: Option<String>,
    /// Number of status checks after submission.
    pub polls: u32,
    /// Generation duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// A generated video with its data and metadata.
#[derive(Debug, Clone)]
pub struct GeneratedVideo {
    /// Raw video bytes.
    pub data: Vec<u8>,
    /// MIME type (e.g., "video/mp4").
    pub mime_type: String,
    /// Generation metadata.
    pub metadata: VideoMetadata,
}

impl GeneratedVideo {
    /// Returns the size of the video data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_round_trip() {
        assert_eq!(AspectRatio::Landscape.as_str(), "16:9");
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait);
        assert!("1:1".parse::<AspectRatio>().is_err());
        assert_eq!(
            serde_json::to_string(&AspectRatio::Portrait).unwrap(),
            "\"9:16\""
        );
    }

    #[test]
    fn test_validate_rejects_blank_prompt() {
        let req = VideoRequest::new("   ", AspectRatio::Landscape);
        assert!(matches!(req.validate(), Err(StudioError::MissingInput(_))));
        assert!(VideoRequest::new("a cat", AspectRatio::Landscape)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Polling.is_terminal());
        assert_eq!(
            VideoJob::new(VideoRequest::new("x", AspectRatio::Landscape)).status,
            JobStatus::Submitted
        );
    }
}
