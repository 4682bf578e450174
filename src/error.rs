//! Error types for studio operations.

use std::time::Duration;

/// Signature the provider uses when the API key does not resolve to a usable project.
const INVALID_CREDENTIAL_SIGNATURE: &str = "requested entity was not found";

/// Longest provider message kept in an error.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while editing, chatting or generating video.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    /// Local validation failed before anything was sent (no image, no prompt).
    #[error("missing input: {0}")]
    MissingInput(String),

    /// The provider rejected the request.
    #[error("gateway error: {status} - {message}")]
    Gateway { status: u16, message: String },

    /// API key missing at startup.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The provider reported that the selected key is not valid for this operation.
    #[error("invalid API key: {0}")]
    InvalidCredential(String),

    /// Video generation needs a selected key and none is selected.
    #[error("select an API key before generating video")]
    CredentialRequired,

    /// Image edit or video job failed on the provider side.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// A chat turn failed.
    #[error("chat failed: {0}")]
    ChatError(String),

    /// The provider reported success but returned nothing usable.
    #[error("generation completed but no result was returned")]
    ResultMissing,

    /// Retrieving a generated asset returned a non-success status.
    #[error("download failed with status {status}")]
    DownloadFailed { status: u16 },

    /// Image bytes could not be decoded or encoded.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// Persisted session data could not be read.
    #[error("stored session is corrupt: {0}")]
    StorageCorrupt(String),

    /// Video job exceeded its time budget.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Video job was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Another request is still in flight.
    #[error("another request is already in progress")]
    Busy,

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error (e.g., reading an input image).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StudioError {
    /// Returns true if the provider message carries the invalid-key signature.
    pub fn is_invalid_credential(&self) -> bool {
        match self {
            Self::InvalidCredential(_) => true,
            Self::Gateway { message, .. }
            | Self::GenerationFailed(message)
            | Self::ChatError(message) => is_invalid_credential_message(message),
            _ => false,
        }
    }

    /// Text shown in the output panel of the action that failed.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingInput(what) => format!("Please {what}."),
            Self::InvalidCredential(_) | Self::CredentialRequired => {
                "Your API key is not valid for this request. Please select a key again.".into()
            }
            Self::Timeout(after) => {
                format!("Generation took longer than {}s and was stopped.", after.as_secs())
            }
            Self::Cancelled => "Generation was cancelled.".into(),
            Self::Busy => "Please wait for the current request to finish.".into(),
            other => format!("Something went wrong: {other}"),
        }
    }
}

/// Returns true if `message` matches the provider's invalid-key signature.
pub fn is_invalid_credential_message(message: &str) -> bool {
    message.to_lowercase().contains(INVALID_CREDENTIAL_SIGNATURE)
}

/// Strips key material from a provider message and clips it to a sane length.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(MAX_ERROR_MESSAGE_LEN));
    for (i, segment) in text.split("key=").enumerate() {
        if i == 0 {
            out.push_str(segment);
            continue;
        }
        out.push_str("key=[redacted]");
        let rest = segment
            .find(|c: char| c == '&' || c == '"' || c.is_whitespace())
            .map(|end| &segment[end..])
            .unwrap_or("");
        out.push_str(rest);
    }
    let trimmed = out.trim();
    if trimmed.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let clipped: String = trimmed.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{clipped}...")
    } else {
        trimmed.to_string()
    }
}

/// Reads a `Retry-After` header given in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Result type alias for studio operations.
pub type Result<T> = std::result::Result<T, StudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_credential_signature() {
        let err = StudioError::GenerationFailed(
            "Requested entity was not found. [NOT_FOUND]".into(),
        );
        assert!(err.is_invalid_credential());

        let err = StudioError::Gateway {
            status: 500,
            message: "internal".into(),
        };
        assert!(!err.is_invalid_credential());
        assert!(StudioError::InvalidCredential("x".into()).is_invalid_credential());
        assert!(!StudioError::ResultMissing.is_invalid_credential());
    }

    #[test]
    fn test_error_display() {
        let err = StudioError::Gateway {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "gateway error: 404 - Not found");

        let err = StudioError::DownloadFailed { status: 403 };
        assert_eq!(err.to_string(), "download failed with status 403");
    }

    #[test]
    fn test_user_message() {
        let err = StudioError::MissingInput("upload an image first".into());
        assert_eq!(err.user_message(), "Please upload an image first.");

        let err = StudioError::InvalidCredential("Requested entity was not found".into());
        assert!(err.user_message().contains("select a key again"));

        let err = StudioError::Timeout(Duration::from_secs(600));
        assert!(err.user_message().contains("600s"));
    }

    #[test]
    fn test_sanitize_redacts_key() {
        let text = "GET https://host/file?alt=media&key=AIzaSECRET failed";
        let clean = sanitize_error_message(text);
        assert!(!clean.contains("AIzaSECRET"));
        assert!(clean.contains("key=[redacted] failed"));
    }

    #[test]
    fn test_sanitize_clips_long_messages() {
        let text = "x".repeat(2_000);
        let clean = sanitize_error_message(&text);
        assert_eq!(clean.chars().count(), MAX_ERROR_MESSAGE_LEN + 3);
        assert!(clean.ends_with("..."));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(reqwest::header::RETRY_AFTER, "30".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(30));
    }
}
