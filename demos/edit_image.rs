//! Image editing example - applies a text prompt to an existing image.
//!
//! Run with: `cargo run --example edit_image -- <input_image.png>`
//!
//! Requires `GOOGLE_API_KEY` environment variable.

use genstudio::{ImageAsset, ImageFormat, Studio, StudioConfig, StudioError};

#[tokio::main]
async fn main() -> genstudio::Result<()> {
    let input_path = std::env::args()
        .nth(1)
        .ok_or_else(|| StudioError::MissingInput("pass an input image path".into()))?;

    let studio = Studio::open(&StudioConfig::from_env())?;
    studio.load_original(ImageAsset::load(&input_path)?)?;

    let image = studio
        .edit(
            "Make the colors more vibrant and add a warm sunset glow",
            ImageFormat::Png,
        )
        .await?;
    image.save("edited.png")?;
    println!(
        "Edited image saved to edited.png ({} bytes, {} edits in history)",
        image.size(),
        studio.session().history().len()
    );

    Ok(())
}
