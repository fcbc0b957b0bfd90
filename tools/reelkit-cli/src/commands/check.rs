//! Check media tool availability.

use reelkit_common::config::AppConfig;
use reelkit_engine::ffmpeg::command_exists;
use reelkit_engine::gstreamer_available;

pub fn run(config: &AppConfig, write_config: bool) -> anyhow::Result<()> {
    println!("reelkit System Check");
    println!("{}", "=".repeat(50));

    let mut ready = true;
    for tool in ["ffmpeg", "ffprobe"] {
        if command_exists(tool) {
            println!("[OK] {tool} found");
        } else {
            println!("[MISSING] {tool} not found in PATH (required for probe and export)");
            ready = false;
        }
    }

    if gstreamer_available() {
        println!("[OK] GStreamer playbin available");
    } else {
        println!("[WARN] GStreamer playbin unavailable; `reelkit play` will not work");
    }

    println!();
    println!("Resources dir: {}", config.resources_dir.display());
    println!("Export dir: {}", config.export.output_dir.display());
    println!("Parallel encodes: {}", config.export.max_parallel_jobs);
    if write_config {
        let path = config.save()?;
        println!("Config written: {}", path.display());
    }

    println!();
    if ready {
        println!("All required tools are available. reelkit is ready.");
    } else {
        println!("Some required tools are missing. See above.");
    }

    Ok(())
}
