//! Headless playback.

use std::path::PathBuf;
use std::sync::Arc;

use reelkit_common::config::AppConfig;
use reelkit_engine::SystemEngine;
use reelkit_media::{Locator, MediaEngine};
use reelkit_player::{AssetPlayer, AssetPlayerProperties, PlaybackState, PlayerAction, SetupOptions};

pub async fn run(
    config: &AppConfig,
    path: PathBuf,
    should_loop: bool,
    muted: bool,
    rate: f32,
    seek: Option<f64>,
    skip: Option<f64>,
) -> anyhow::Result<()> {
    let engine = Arc::new(SystemEngine::new(config));
    if !engine.playback_available() {
        anyhow::bail!("GStreamer playbin is not available; run `reelkit check`");
    }
    let asset = engine
        .open(&Locator::file(&path))
        .map_err(|e| anyhow::anyhow!("Failed to open media: {e}"))?;

    let player = AssetPlayer::spawn(engine, config.playback.clone())?;
    let props = player
        .perform(PlayerAction::setup_with(
            asset,
            SetupOptions {
                start_muted: muted,
                should_loop,
            },
        ))
        .await;
    if let PlaybackState::Failed(error) = &props.state {
        anyhow::bail!("Setup failed: {}", describe(error.as_deref()));
    }

    if (rate - 1.0).abs() > f32::EPSILON {
        player.perform(PlayerAction::ChangePlaybackRate(rate)).await;
    }
    if let Some(secs) = seek {
        player.perform(PlayerAction::SeekToTimeInSeconds(secs)).await;
    }
    if let Some(by) = skip {
        player.perform(PlayerAction::Skip(by)).await;
    }

    println!("Playing: {}", path.display());
    player.perform(PlayerAction::Play).await;

    let mut snapshots = player.subscribe();
    loop {
        let props = snapshots.borrow_and_update().clone();
        print_progress(&props);

        match &props.state {
            PlaybackState::Finished => {
                println!("\nFinished.");
                break;
            }
            PlaybackState::Failed(error) => {
                println!("\nPlayback failed: {}", describe(error.as_deref()));
                break;
            }
            _ => {}
        }

        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                player.perform(PlayerAction::Stop).await;
                println!("\nStopped.");
                break;
            }
        }
    }

    player.shutdown().await;
    Ok(())
}

fn print_progress(props: &AssetPlayerProperties) {
    print!(
        "\r  {} / {} ({}) rate {:.2}{} [{}]  ",
        props.current_time_text,
        props.duration_text,
        props.time_left_text,
        props.rate,
        if props.is_muted { " muted" } else { "" },
        props.state.name(),
    );
}

fn describe(error: Option<&reelkit_common::error::ReelkitError>) -> String {
    error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}
