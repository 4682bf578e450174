//! Studio configuration, resolved from explicit values then the environment.

use crate::error::{Result, StudioError};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variables checked, in order, for the API key.
pub const API_KEY_VARS: [&str; 3] = ["GOOGLE_API_KEY", "GEMINI_API_KEY", "API_KEY"];

/// Default model for prompt-driven image edits.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
/// Default model for chat turns.
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
/// Default model for video jobs.
pub const DEFAULT_VIDEO_MODEL: &str = "veo-3.1-generate-preview";
/// Default wait between video job status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// API key, if one was supplied or found in the environment.
    pub api_key: Option<String>,
    /// Model used by image edits.
    pub image_model: String,
    /// Model used by chat turns.
    pub chat_model: String,
    /// Model used by video jobs.
    pub video_model: String,
    /// Wait between video job status checks.
    pub poll_interval: Duration,
    /// Upper bound on a video job, measured from submission. `None` waits forever.
    pub video_timeout: Option<Duration>,
    /// Location of the persisted edit session.
    pub store_path: PathBuf,
}

impl StudioConfig {
    /// Creates a new `StudioConfigBuilder`.
    pub fn builder() -> StudioConfigBuilder {
        StudioConfigBuilder::new()
    }

    /// Resolves everything from the environment.
    pub fn from_env() -> Self {
        StudioConfigBuilder::new().build()
    }

    /// Returns the API key or the startup error used by the image and chat paths.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(missing_api_key)
    }
}

/// Builder for [`StudioConfig`].
#[derive(Debug, Clone, Default)]
pub struct StudioConfigBuilder {
    api_key: Option<String>,
    image_model: Option<String>,
    chat_model: Option<String>,
    video_model: Option<String>,
    poll_interval: Option<Duration>,
    video_timeout: Option<Duration>,
    store_path: Option<PathBuf>,
}

impl StudioConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to the variables in [`API_KEY_VARS`].
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the image edit model.
    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = Some(model.into());
        self
    }

    /// Sets the chat model.
    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = Some(model.into());
        self
    }

    /// Sets the video model.
    pub fn video_model(mut self, model: impl Into<String>) -> Self {
        self.video_model = Some(model.into());
        self
    }

    /// Sets the polling interval for video jobs.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Sets the maximum time to wait for a video job.
    /// Falls back to `GENSTUDIO_VIDEO_TIMEOUT_SECS`.
    pub fn video_timeout(mut self, timeout: Duration) -> Self {
        self.video_timeout = Some(timeout);
        self
    }

    /// Sets where the edit session is persisted. Falls back to `GENSTUDIO_STORE`.
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> StudioConfig {
        let api_key = resolve_api_key(self.api_key);

        let video_timeout = self.video_timeout.or_else(|| {
            std::env::var("GENSTUDIO_VIDEO_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
        });

        let store_path = self
            .store_path
            .or_else(|| std::env::var_os("GENSTUDIO_STORE").map(PathBuf::from))
            .unwrap_or_else(default_store_path);

        StudioConfig {
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
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            video_timeout,
            store_path,
        }
    }
}

/// Explicit key if non-blank, else the first non-blank variable in [`API_KEY_VARS`].
pub(crate) fn resolve_api_key(explicit: Option<String>) -> Option<String> {
    explicit
        .filter(|k| !k.trim().is_empty())
        .or_else(api_key_from_env)
}

pub(crate) fn missing_api_key() -> StudioError {
    StudioError::Auth(format!(
        "no API key provided; set one of {}",
        API_KEY_VARS.join(", ")
    ))
}

fn api_key_from_env() -> Option<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.trim().is_empty())
}

fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("genstudio")
        .join("session.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StudioConfig::builder().api_key("test-key").build();
        assert_eq!(config.api_key.as_deref(), Some("test-key"));
        assert_eq!(config.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.chat_model, DEFAULT_CHAT_MODEL);
        assert_eq!(config.video_model, DEFAULT_VIDEO_MODEL);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert!(config.store_path.ends_with("session.json"));
    }

    #[test]
    fn test_explicit_values_win() {
        let config = StudioConfig::builder()
            .api_key("k")
            .video_model("veo-custom")
            .poll_interval(Duration::from_secs(2))
            .video_timeout(Duration::from_secs(900))
            .store_path("/tmp/genstudio-test/session.json")
            .build();
        assert_eq!(config.video_model, "veo-custom");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.video_timeout, Some(Duration::from_secs(900)));
        assert_eq!(
            config.store_path,
            PathBuf::from("/tmp/genstudio-test/session.json")
        );
    }

    #[test]
    fn test_resolve_api_key_prefers_explicit() {
        assert_eq!(resolve_api_key(Some("explicit".into())).as_deref(), Some("explicit"));
        assert_eq!(resolve_api_key(Some("   ".into())), api_key_from_env());
        assert_eq!(resolve_api_key(None), api_key_from_env());
    }

    #[test]
    fn test_require_api_key() {
        let config = StudioConfig::builder().api_key("k").build();
        assert_eq!(config.require_api_key().unwrap(), "k");

        // Only meaningful when no key is present in the environment.
        if api_key_from_env().is_none() {
            let config = StudioConfig::builder().build();
            assert!(matches!(
                config.require_api_key(),
                Err(StudioError::Auth(_))
            ));
        }
    }
}
