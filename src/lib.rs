#![warn(missing_docs)]
//! GenStudio - prompt-driven image editing, chat and video generation.
//!
//! A [`Studio`] owns one editing session, one conversation and one video
//! panel. Edits and their history survive restarts through a
//! [`KeyValueStore`]; video jobs are submitted and polled until the
//! result can be downloaded.
//!
//! # Quick Start - Editing
//!
//! ```no_run
//! use genstudio::{ImageAsset, ImageFormat, Studio, StudioConfig};
//!
//! #[tokio::main]
//! async fn main() -> genstudio::Result<()> {
//!     let studio = Studio::open(&StudioConfig::from_env())?;
//!     studio.load_original(ImageAsset::load("cat.png")?)?;
//!     let edited = studio.edit("Add a retro filter", ImageFormat::Jpeg).await?;
//!     edited.save("cat-retro.jpg")?;
//!     Ok(())
//! }
//! ```
//!
//! # Quick Start - Video
//!
//! ```no_run
//! use genstudio::{AspectRatio, Studio, StudioConfig, VideoRequest};
//!
//! #[tokio::main]
//! async fn main() -> genstudio::Result<()> {
//!     let studio = Studio::open(&StudioConfig::from_env())?;
//!     let request = VideoRequest::new("A neon hologram of a cat", AspectRatio::Landscape);
//!     studio.generate_video(request).await?;
//!     studio.save_video("cat.mp4")?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `gemini`: Gemini gateway (image edits, chat, Veo video)
//! - `cli`: Command-line interface

pub mod chat;
pub mod config;
pub mod credential;
mod error;
pub mod gateway;
pub mod image;
pub mod session;
pub mod store;
mod studio;
pub mod video;

// Re-export error types at crate root
pub use error::{is_invalid_credential_message, Result, StudioError};

pub use chat::{ChatMessage, ChatRole, ChatSession, ChatTranscript, CHAT_FALLBACK_REPLY};
pub use config::{StudioConfig, StudioConfigBuilder};
pub use credential::CredentialGate;
pub use gateway::{ChatSessionId, Gateway};
pub use image::{ImageAsset, ImageFormat};
pub use session::{EditHistory, EditSession};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use studio::{Studio, VideoOutcome};
pub use video::{
    AspectRatio, AssetHandle, AssetSlot, GeneratedVideo, JobHandle, JobPoller, JobStatus,
    VideoJob, VideoMetadata, VideoRequest,
};

#[cfg(feature = "gemini")]
pub use gateway::{GeminiGateway, GeminiGatewayBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{Result, StudioError};
    pub use crate::gateway::Gateway;
    pub use crate::image::{ImageAsset, ImageFormat};
    pub use crate::store::KeyValueStore;
    pub use crate::studio::Studio;
    pub use crate::video::{AspectRatio, VideoRequest};

    #[cfg(feature = "gemini")]
    pub use crate::gateway::GeminiGateway;
}
