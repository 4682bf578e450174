//! Basic video generation example.
//!
//! Run with: `cargo run --example generate_video`
//!
//! Requires `GOOGLE_API_KEY` environment variable.

use genstudio::{AspectRatio, Studio, StudioConfig, VideoRequest};

#[tokio::main]
async fn main() -> genstudio::Result<()> {
    let studio = Studio::open(&StudioConfig::from_env())?;

    let request = VideoRequest::new(
        "Ocean waves crashing on a rocky shore at sunset",
        AspectRatio::Landscape,
    );

    println!("Generating video (this may take a few minutes)...");
    let outcome = studio.generate_video(request).await?;

    let saved = studio.save_video("output.mp4")?;
    println!(
        "Generated video: {} ({} bytes, {} status checks)",
        saved.display(),
        outcome.size,
        outcome.metadata.polls
    );

    Ok(())
}
