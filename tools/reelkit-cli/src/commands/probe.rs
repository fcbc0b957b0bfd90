//! Show media information.

use std::path::PathBuf;

use reelkit_common::clock::format_time_string;
use reelkit_common::config::AppConfig;
use reelkit_engine::SystemEngine;
use reelkit_media::{Locator, MediaEngine};

pub fn run(config: &AppConfig, path: PathBuf) -> anyhow::Result<()> {
    let engine = SystemEngine::new(config);
    let asset = engine
        .open(&Locator::file(&path))
        .map_err(|e| anyhow::anyhow!("Failed to open media: {e}"))?;

    println!("Media: {}", path.display());
    println!(
        "  Duration: {} ({:.3}s)",
        format_time_string(asset.duration()),
        asset.duration()
    );
    println!("  Size: {}", asset.natural_size());
    println!("  Audio: {}", if asset.info().has_audio { "yes" } else { "no" });
    println!("  Playable: {}", if asset.is_playable() { "yes" } else { "no" });

    Ok(())
}
