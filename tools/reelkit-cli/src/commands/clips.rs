//! Split and export fixed-length clips.

use std::path::PathBuf;

use tokio::sync::oneshot;

use reelkit_common::config::AppConfig;
use reelkit_export::{CallbackQueue, VideoExporter};

use super::{open_video, system_engine, OverlayArgs, RangeArgs};

pub async fn run(
    mut config: AppConfig,
    path: PathBuf,
    clip_length: f64,
    range: RangeArgs,
    overlay: OverlayArgs,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(dir) = output_dir {
        config.export.output_dir = dir;
    }
    let engine = system_engine(&config)?;
    let video = open_video(engine.as_ref(), path.clone(), &range)?;
    let exporter = VideoExporter::new(engine, config.export.clone())?;

    let (queue, mut jobs) = CallbackQueue::channel();
    let (done_tx, done_rx) = oneshot::channel();
    let operations = exporter.export_clips(
        &video,
        clip_length,
        queue,
        overlay.descriptor(),
        move |urls, errors| {
            done_tx.send((urls, errors)).ok();
        },
    )?;

    println!(
        "Exporting {} clip(s) of {clip_length}s from {}",
        operations.len(),
        path.display()
    );
    for (index, op) in operations.iter().enumerate() {
        println!("  clip {index}: {} -> {}", op.input().range(), op.output().display());
        op.set_progress_observer(move |p| {
            if p >= 1.0 {
                println!("  clip {index}: done");
            }
        });
    }

    // Completion is posted to this queue; run it here like a main loop would.
    let job = tokio::select! {
        job = jobs.recv() => job,
        _ = tokio::signal::ctrl_c() => {
            for op in &operations {
                op.cancel();
            }
            jobs.recv().await
        }
    };
    if let Some(job) = job {
        job();
    }

    let (urls, errors) = done_rx
        .await
        .map_err(|_| anyhow::anyhow!("clip export ended without a result"))?;

    println!("\nExported {} of {} clip(s):", urls.len(), operations.len());
    for url in &urls {
        println!("  {}", url.display());
    }
    if !errors.is_empty() {
        println!("Failures:");
        for error in &errors {
            println!("  - {error}");
        }
        anyhow::bail!("{} clip(s) failed", errors.len());
    }

    Ok(())
}
