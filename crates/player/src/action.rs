//! The closed set of actions an [`AssetPlayer`](crate::AssetPlayer) accepts.

use reelkit_media::Asset;

/// Options applied when a new asset is set up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetupOptions {
    /// Start with audio muted.
    pub start_muted: bool,

    /// Jump back to the loop start instead of finishing.
    pub should_loop: bool,
}

/// A caller or programmatic request to the player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    /// Replace the current session with `asset`.
    Setup { asset: Asset, options: SetupOptions },
    Play,
    Pause,
    /// Pause and rewind to the loop start.
    Stop,
    ChangeIsMuted(bool),
    /// Volume in `[0.0, 1.0]`; out-of-range values are clamped.
    ChangeVolume(f32),
    ChangePlaybackRate(f32),
    SeekToTimeInSeconds(f64),
    /// Relative seek; negative values skip backwards.
    Skip(f64),
    BeginFastForward,
    EndFastForward,
    BeginRewind,
    EndRewind,
    ChangeShouldLoop(bool),
    /// Restrict playback to `[start, end)`. `None` means the asset duration.
    ChangeLoopRange { start: f64, end: Option<f64> },
}

impl PlayerAction {
    /// Plain setup with default options.
    pub fn setup(asset: Asset) -> Self {
        Self::Setup {
            asset,
            options: SetupOptions::default(),
        }
    }

    pub fn setup_with(asset: Asset, options: SetupOptions) -> Self {
        Self::Setup { asset, options }
    }

    /// Short label for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Setup { .. } => "setup",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::ChangeIsMuted(_) => "change_is_muted",
            Self::ChangeVolume(_) => "change_volume",
            Self::ChangePlaybackRate(_) => "change_playback_rate",
            Self::SeekToTimeInSeconds(_) => "seek",
            Self::Skip(_) => "skip",
            Self::BeginFastForward => "begin_fast_forward",
            Self::EndFastForward => "end_fast_forward",
            Self::BeginRewind => "begin_rewind",
            Self::EndRewind => "end_rewind",
            Self::ChangeShouldLoop(_) => "change_should_loop",
            Self::ChangeLoopRange { .. } => "change_loop_range",
        }
    }
}
