//! Video generation module.

mod asset;
mod poller;
mod types;

pub use asset::{AssetHandle, AssetSlot};
pub use poller::JobPoller;
pub use types::{
    AspectRatio, GeneratedVideo, JobHandle, JobStatus, VideoJob, VideoMetadata, VideoRequest,
};
