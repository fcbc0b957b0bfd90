use std::sync::Arc;
use std::time::Duration;

use reelkit_common::config::PlaybackDefaults;
use reelkit_engine::{SyntheticEngine, SyntheticMedia, SyntheticSettings};
use reelkit_media::{Asset, Locator, MediaEngine};
use reelkit_player::{AssetPlayer, PlaybackState, PlayerAction, SetupOptions};

const EVENTUALLY: Duration = Duration::from_secs(5);

fn thirty_second() -> Locator {
    Locator::resource("SampleVideo_1280x720_5mb", "mp4")
}

fn five_second() -> Locator {
    Locator::resource("SampleVideo_1280x720_1mb", "mp4")
}

fn broken() -> Locator {
    Locator::resource("corrupt_stream", "mp4")
}

fn engine() -> Arc<SyntheticEngine> {
    let engine = SyntheticEngine::new(SyntheticSettings {
        tick: Duration::from_millis(5),
        playback_speed: 10.0,
        ..SyntheticSettings::default()
    })
    .with_media(thirty_second(), SyntheticMedia::new(29.568, 1280, 720))
    .with_media(five_second(), SyntheticMedia::new(5.0, 1280, 720))
    .with_media(broken(), SyntheticMedia::new(5.0, 640, 360).failing_at(0.5))
    .with_media(
        Locator::resource("drm_protected", "mp4"),
        SyntheticMedia::new(5.0, 640, 360).unplayable(),
    );
    Arc::new(engine)
}

fn player(engine: &Arc<SyntheticEngine>) -> AssetPlayer {
    AssetPlayer::spawn(engine.clone(), PlaybackDefaults::default()).unwrap()
}

fn open(engine: &SyntheticEngine, locator: Locator) -> Asset {
    engine.open(&locator).unwrap()
}

#[tokio::test]
async fn setup_is_visible_immediately() {
    let engine = engine();
    let player = player(&engine);
    assert_eq!(player.properties().state, PlaybackState::NotReady);

    let asset = open(&engine, thirty_second());
    let props = player.perform(PlayerAction::setup(asset.clone())).await;

    assert_eq!(props.state, PlaybackState::Setup(asset.clone()));
    assert_eq!(player.properties().state, PlaybackState::Setup(asset));
    assert_eq!(props.duration, 29.568);
    assert_eq!(props.duration_text, "0:29");
    assert_eq!(props.current_time, 0.0);
}

#[tokio::test]
async fn play_stays_playing() {
    let engine = engine();
    let player = player(&engine);
    player
        .perform(PlayerAction::setup(open(&engine, thirty_second())))
        .await;

    let props = player.perform(PlayerAction::Play).await;
    assert_eq!(props.state, PlaybackState::Playing);

    let failed = player
        .wait_for_state(|s| s.is_failed(), Duration::from_millis(300))
        .await;
    assert!(failed.is_err());
    assert_eq!(player.properties().state, PlaybackState::Playing);
    assert!(player.properties().current_time > 0.0);
}

#[tokio::test]
async fn pause_from_setup_and_from_playing() {
    let engine = engine();
    let player = player(&engine);
    player
        .perform(PlayerAction::setup(open(&engine, thirty_second())))
        .await;

    let props = player.perform(PlayerAction::Pause).await;
    assert_eq!(props.state, PlaybackState::Paused);

    player.perform(PlayerAction::Play).await;
    let props = player.perform(PlayerAction::Pause).await;
    assert_eq!(props.state, PlaybackState::Paused);
}

#[tokio::test]
async fn mute_round_trip() {
    let engine = engine();
    let player = player(&engine);
    player
        .perform(PlayerAction::setup(open(&engine, thirty_second())))
        .await;

    assert!(player.perform(PlayerAction::ChangeIsMuted(true)).await.is_muted);
    assert!(!player.perform(PlayerAction::ChangeIsMuted(false)).await.is_muted);
}

#[tokio::test]
async fn start_muted_option() {
    let engine = engine();
    let player = player(&engine);
    let props = player
        .perform(PlayerAction::setup_with(
            open(&engine, thirty_second()),
            SetupOptions {
                start_muted: true,
                should_loop: false,
            },
        ))
        .await;
    assert!(props.is_muted);
}

#[tokio::test]
async fn short_asset_finishes() {
    let engine = engine();
    let player = player(&engine);
    let asset = open(&engine, five_second());
    let props = player.perform(PlayerAction::setup(asset.clone())).await;
    assert_eq!(props.state, PlaybackState::Setup(asset));

    player.perform(PlayerAction::Play).await;
    let finished = player
        .wait_for_state(|s| *s == PlaybackState::Finished, EVENTUALLY)
        .await
        .unwrap();
    assert_eq!(finished.current_time, 5.0);
    assert_eq!(finished.time_left_text, "-0:00");
}

#[tokio::test]
async fn play_after_finished_restarts_from_loop_start() {
    let engine = engine();
    let player = player(&engine);
    player
        .perform(PlayerAction::setup(open(&engine, five_second())))
        .await;
    player.perform(PlayerAction::Play).await;
    player
        .wait_for_state(|s| *s == PlaybackState::Finished, EVENTUALLY)
        .await
        .unwrap();

    let props = player.perform(PlayerAction::Play).await;
    assert_eq!(props.state, PlaybackState::Playing);
    assert!(props.current_time < 5.0);
}

#[tokio::test]
async fn play_after_finished_keeps_a_later_seek() {
    let engine = engine();
    let player = player(&engine);
    player
        .perform(PlayerAction::setup(open(&engine, five_second())))
        .await;
    player.perform(PlayerAction::Play).await;
    player
        .wait_for_state(|s| *s == PlaybackState::Finished, EVENTUALLY)
        .await
        .unwrap();

    let props = player.perform(PlayerAction::SeekToTimeInSeconds(2.0)).await;
    assert_eq!(props.state, PlaybackState::Finished);
    assert_eq!(props.current_time, 2.0);

    let props = player.perform(PlayerAction::Play).await;
    assert_eq!(props.state, PlaybackState::Playing);
    assert_eq!(props.current_time, 2.0);
}

#[tokio::test]
async fn looping_never_finishes() {
    let engine = engine();
    let player = player(&engine);
    player
        .perform(PlayerAction::setup_with(
            open(&engine, five_second()),
            SetupOptions {
                start_muted: false,
                should_loop: true,
            },
        ))
        .await;
    player
        .perform(PlayerAction::ChangeLoopRange {
            start: 1.0,
            end: Some(2.0),
        })
        .await;
    player.perform(PlayerAction::SeekToTimeInSeconds(1.0)).await;
    player.perform(PlayerAction::Play).await;

    let finished = player
        .wait_for_state(|s| *s == PlaybackState::Finished, Duration::from_millis(600))
        .await;
    assert!(finished.is_err());

    let props = player.properties();
    assert_eq!(props.state, PlaybackState::Playing);
    assert!(props.current_time >= 1.0 && props.current_time <= 2.1);
}

#[tokio::test]
async fn loop_range_end_finishes_early() {
    let engine = engine();
    let player = player(&engine);
    player
        .perform(PlayerAction::setup(open(&engine, thirty_second())))
        .await;
    let props = player
        .perform(PlayerAction::ChangeLoopRange {
            start: 0.0,
            end: Some(1.5),
        })
        .await;
    assert_eq!(props.end_time_for_loop, Some(1.5));

    player.perform(PlayerAction::Play).await;
    let finished = player
        .wait_for_state(|s| *s == PlaybackState::Finished, EVENTUALLY)
        .await
        .unwrap();
    assert_eq!(finished.current_time, 1.5);
}

#[tokio::test]
async fn invalid_loop_range_is_ignored() {
    let engine = engine();
    let player = player(&engine);
    player
        .perform(PlayerAction::setup(open(&engine, five_second())))
        .await;

    let props = player
        .perform(PlayerAction::ChangeLoopRange {
            start: 3.0,
            end: Some(2.0),
        })
        .await;
    assert_eq!(props.start_time_for_loop, 0.0);
    assert_eq!(props.end_time_for_loop, None);

    let props = player
        .perform(PlayerAction::ChangeLoopRange {
            start: 0.0,
            end: Some(60.0),
        })
        .await;
    assert_eq!(props.end_time_for_loop, None);
}

#[tokio::test]
async fn stop_returns_to_setup_at_loop_start() {
    let engine = engine();
    let player = player(&engine);
    let asset = open(&engine, thirty_second());
    player.perform(PlayerAction::setup(asset.clone())).await;
    player
        .perform(PlayerAction::ChangeLoopRange {
            start: 2.0,
            end: None,
        })
        .await;
    player.perform(PlayerAction::SeekToTimeInSeconds(10.0)).await;
    player.perform(PlayerAction::Play).await;

    let props = player.perform(PlayerAction::Stop).await;
    assert_eq!(props.state, PlaybackState::Setup(asset));
    assert_eq!(props.current_time, 2.0);
}

#[tokio::test]
async fn seek_and_skip_clamp_to_duration() {
    let engine = engine();
    let player = player(&engine);
    player
        .perform(PlayerAction::setup(open(&engine, five_second())))
        .await;

    assert_eq!(
        player.perform(PlayerAction::SeekToTimeInSeconds(3.0)).await.current_time,
        3.0
    );
    assert_eq!(player.perform(PlayerAction::Skip(10.0)).await.current_time, 5.0);
    assert_eq!(player.perform(PlayerAction::Skip(-60.0)).await.current_time, 0.0);
}

#[tokio::test]
async fn property_actions_keep_coarse_state() {
    let engine = engine();
    let player = player(&engine);
    let asset = open(&engine, thirty_second());
    player.perform(PlayerAction::setup(asset.clone())).await;

    let props = player.perform(PlayerAction::ChangeVolume(1.7)).await;
    assert_eq!(props.volume, 1.0);
    let props = player.perform(PlayerAction::ChangeVolume(0.25)).await;
    assert_eq!(props.volume, 0.25);

    let props = player.perform(PlayerAction::ChangePlaybackRate(1.5)).await;
    assert_eq!(props.rate, 1.5);
    let props = player.perform(PlayerAction::ChangePlaybackRate(0.0)).await;
    assert_eq!(props.rate, 1.5);

    assert_eq!(props.state, PlaybackState::Setup(asset));
}

#[tokio::test]
async fn scan_actions_restore_rate() {
    let engine = engine();
    let player = player(&engine);
    let defaults = PlaybackDefaults::default();
    player
        .perform(PlayerAction::setup(open(&engine, thirty_second())))
        .await;
    player.perform(PlayerAction::ChangePlaybackRate(1.25)).await;

    let props = player.perform(PlayerAction::BeginFastForward).await;
    assert_eq!(props.rate, defaults.fast_forward_rate);

    // Unmatched end is a no-op.
    let props = player.perform(PlayerAction::EndRewind).await;
    assert_eq!(props.rate, defaults.fast_forward_rate);

    let props = player.perform(PlayerAction::EndFastForward).await;
    assert_eq!(props.rate, 1.25);

    let props = player.perform(PlayerAction::BeginRewind).await;
    assert_eq!(props.rate, defaults.rewind_rate);
    let props = player.perform(PlayerAction::EndRewind).await;
    assert_eq!(props.rate, 1.25);
}

#[tokio::test]
async fn rewind_stops_at_loop_start() {
    let engine = engine();
    let player = player(&engine);
    player
        .perform(PlayerAction::setup(open(&engine, five_second())))
        .await;
    player.perform(PlayerAction::SeekToTimeInSeconds(1.0)).await;
    player.perform(PlayerAction::Play).await;
    player.perform(PlayerAction::BeginRewind).await;

    let paused = player
        .wait_for_state(|s| *s == PlaybackState::Paused, EVENTUALLY)
        .await
        .unwrap();
    assert_eq!(paused.current_time, 0.0);
    assert_eq!(paused.rate, 1.0);
}

#[tokio::test]
async fn engine_failure_is_terminal_until_setup() {
    let engine = engine();
    let player = player(&engine);
    player
        .perform(PlayerAction::setup(open(&engine, broken())))
        .await;
    player.perform(PlayerAction::Play).await;

    let failed = player
        .wait_for_state(|s| s.is_failed(), EVENTUALLY)
        .await
        .unwrap();
    assert_eq!(failed.state, PlaybackState::Failed(None));
    assert!(failed.state.error().is_some());

    let props = player.perform(PlayerAction::Play).await;
    assert!(props.state.is_failed());

    let asset = open(&engine, five_second());
    let props = player.perform(PlayerAction::setup(asset.clone())).await;
    assert_eq!(props.state, PlaybackState::Setup(asset));
}

#[tokio::test]
async fn unplayable_asset_fails_setup() {
    let engine = engine();
    let player = player(&engine);
    let props = player
        .perform(PlayerAction::setup(open(
            &engine,
            Locator::resource("drm_protected", "mp4"),
        )))
        .await;
    assert!(props.state.is_failed());
}

#[tokio::test]
async fn dispatch_is_eventually_applied() {
    let engine = engine();
    let player = player(&engine);
    player.dispatch(PlayerAction::setup(open(&engine, thirty_second())));
    player.dispatch(PlayerAction::Play);

    player
        .wait_for_state(|s| *s == PlaybackState::Playing, EVENTUALLY)
        .await
        .unwrap();
    player.shutdown().await;
}
