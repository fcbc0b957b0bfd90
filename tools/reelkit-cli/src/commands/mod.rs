//! Subcommands and the argument groups they share.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use reelkit_common::config::AppConfig;
use reelkit_engine::SystemEngine;
use reelkit_media::{Locator, MediaEngine, OverlayDescriptor, OverlayRect, VideoAsset};

pub mod check;
pub mod clips;
pub mod export;
pub mod play;
pub mod probe;

/// Range to keep from the source.
#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    /// Start of the range in seconds
    #[arg(long)]
    pub start: Option<f64>,

    /// End of the range in seconds (clamped to the duration)
    #[arg(long)]
    pub end: Option<f64>,
}

/// Image composited over every exported frame.
#[derive(Args, Debug, Clone)]
pub struct OverlayArgs {
    /// Overlay image (PNG)
    #[arg(long)]
    pub overlay: Option<PathBuf>,

    #[arg(long, default_value = "0")]
    pub overlay_x: f64,

    #[arg(long, default_value = "0")]
    pub overlay_y: f64,

    #[arg(long, default_value = "200")]
    pub overlay_width: f64,

    #[arg(long, default_value = "100")]
    pub overlay_height: f64,

    /// Rasterization scale
    #[arg(long, default_value = "1.0")]
    pub overlay_scale: f64,
}

impl OverlayArgs {
    pub fn descriptor(&self) -> Option<OverlayDescriptor> {
        let image = self.overlay.clone()?;
        Some(
            OverlayDescriptor::new(
                image,
                OverlayRect {
                    x: self.overlay_x,
                    y: self.overlay_y,
                    width: self.overlay_width,
                    height: self.overlay_height,
                },
            )
            .with_scale(self.overlay_scale),
        )
    }
}

pub fn system_engine(config: &AppConfig) -> anyhow::Result<Arc<SystemEngine>> {
    let engine = SystemEngine::new(config);
    if !engine.is_available() {
        anyhow::bail!("ffmpeg and ffprobe are required; run `reelkit check`");
    }
    Ok(Arc::new(engine))
}

/// Open `path` and apply the requested range.
pub fn open_video(
    engine: &dyn MediaEngine,
    path: PathBuf,
    range: &RangeArgs,
) -> anyhow::Result<VideoAsset> {
    let asset = engine
        .open(&Locator::file(path))
        .map_err(|e| anyhow::anyhow!("Failed to open media: {e}"))?;
    let mut video = VideoAsset::new(asset)?;
    if let Some(end) = range.end {
        video = video.change_end_time(end)?;
    }
    if let Some(start) = range.start {
        video = video.change_start_time(start)?;
    }
    Ok(video)
}
