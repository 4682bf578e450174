//! Image assets and format conversion.

pub mod normalize;
mod types;

pub use normalize::normalize;
pub use types::{ImageAsset, ImageFormat};
