//! The Media Engine contract.
//!
//! Both the playback state machine and the export pipeline talk to media
//! through [`MediaEngine`]. Backends live in `reelkit-engine`.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use reelkit_common::config::ExportDefaults;
use reelkit_common::error::ReelkitResult;

use crate::asset::{Asset, Locator};
use crate::overlay::OverlayDescriptor;
use crate::video_asset::VideoAsset;

/// Asynchronous feedback from a running playback session.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Periodic position report.
    Position { current_secs: f64, buffered_secs: f64 },
    /// The session reached the end of the media (or the start when rewinding).
    Ended,
    /// A fatal decode/playback fault; the session is unusable.
    Failed { message: String },
}

/// Callback through which a session reports [`PlaybackEvent`]s.
///
/// Invoked on an engine-owned thread.
pub type PlaybackCallback = Box<dyn Fn(PlaybackEvent) + Send + Sync>;

/// Callback through which an encode reports fractional progress.
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Handle to one playback session.
pub trait PlaybackSession: Send {
    /// Start or resume playback at `rate`.
    fn play(&mut self, rate: f32) -> ReelkitResult<()>;

    fn pause(&mut self) -> ReelkitResult<()>;

    fn seek(&mut self, secs: f64) -> ReelkitResult<()>;

    /// Change rate; takes effect immediately when playing.
    fn set_rate(&mut self, rate: f32) -> ReelkitResult<()>;

    /// Volume in `[0.0, 1.0]`.
    fn set_volume(&mut self, volume: f32) -> ReelkitResult<()>;

    fn set_muted(&mut self, muted: bool) -> ReelkitResult<()>;

    /// Release the session. No events are delivered afterwards.
    fn stop(&mut self) -> ReelkitResult<()>;
}

/// Encoder parameters for one export.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSettings {
    pub video_codec: String,
    pub preset: String,
    pub crf: u32,
    pub audio_bitrate_kbps: u32,
    pub progress_hz: u32,
}

impl From<&ExportDefaults> for EncoderSettings {
    fn from(defaults: &ExportDefaults) -> Self {
        Self {
            video_codec: defaults.video_codec.clone(),
            preset: defaults.preset.clone(),
            crf: defaults.crf,
            audio_bitrate_kbps: defaults.audio_bitrate_kbps,
            progress_hz: defaults.progress_hz,
        }
    }
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self::from(&ExportDefaults::default())
    }
}

/// Everything an engine needs to render one output file.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    /// Source asset and the range to keep.
    pub input: VideoAsset,

    /// Optional overlay composited over every frame.
    pub overlay: Option<OverlayDescriptor>,

    /// Destination; unique per request.
    pub output: PathBuf,

    pub encoder: EncoderSettings,
}

/// Decode/playback/encode capability consumed by the player and exporter.
pub trait MediaEngine: Send + Sync {
    /// Backend name.
    fn name(&self) -> &str;

    /// Check if this backend's tools are present on the system.
    fn is_available(&self) -> bool;

    /// Resolve and probe a locator.
    fn open(&self, locator: &Locator) -> ReelkitResult<Asset>;

    /// Begin a paused playback session at position zero.
    ///
    /// Events for this session are delivered through `events` until
    /// [`PlaybackSession::stop`] is called or the session is dropped.
    fn start_playback(
        &self,
        asset: &Asset,
        events: PlaybackCallback,
    ) -> ReelkitResult<Box<dyn PlaybackSession>>;

    /// Render `request` to `request.output`. Blocks until finished.
    ///
    /// `progress` receives values in `[0.0, 1.0]`. When `cancel` becomes
    /// true the engine stops as soon as it can and returns
    /// `ReelkitError::Cancelled`.
    fn encode(
        &self,
        request: &EncodeRequest,
        progress: ProgressFn<'_>,
        cancel: &AtomicBool,
    ) -> ReelkitResult<PathBuf>;

    /// How many encodes may run at once; `None` means unbounded.
    fn max_concurrent_encodes(&self) -> Option<usize> {
        None
    }
}
