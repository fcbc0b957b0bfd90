//! Export a trimmed range.

use std::path::PathBuf;

use reelkit_common::config::AppConfig;
use reelkit_export::VideoExporter;

use super::{open_video, system_engine, OverlayArgs, RangeArgs};

pub async fn run(
    mut config: AppConfig,
    path: PathBuf,
    range: RangeArgs,
    overlay: OverlayArgs,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(dir) = output_dir {
        config.export.output_dir = dir;
    }
    let engine = system_engine(&config)?;
    let video = open_video(engine.as_ref(), path.clone(), &range)?;

    println!("Exporting: {}", path.display());
    println!("  Range: {}", video.range());
    println!("  Size: {}", video.asset().natural_size());

    let exporter = VideoExporter::new(engine, config.export.clone())?;
    let op = exporter.export_video_without_crop(
        &video,
        overlay.descriptor(),
        |path| println!("\nExport complete: {}", path.display()),
        |error| tracing::debug!(error = %error, "Export failure delivered"),
    )?;
    println!("  Output: {}", op.output().display());
    op.set_progress_observer(|p| print!("\r  Progress: {:.1}%  ", p * 100.0));

    tokio::select! {
        outcome = op.wait() => {
            outcome.map_err(|e| anyhow::anyhow!("Export failed: {e}"))?;
        }
        _ = tokio::signal::ctrl_c() => {
            op.cancel();
            println!("\nExport cancelled; partial output left at {}", op.output().display());
        }
    }

    Ok(())
}
