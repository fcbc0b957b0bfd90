//! Coarse playback state.

use reelkit_common::error::SharedError;
use reelkit_media::Asset;

/// State of one player session. Initial state is [`PlaybackState::NotReady`].
#[derive(Debug, Clone)]
pub enum PlaybackState {
    NotReady,
    /// An asset is loaded and positioned, not yet playing.
    Setup(Asset),
    Playing,
    Paused,
    /// Reached the loop end (or the asset end) without looping.
    Finished,
    /// Terminal until the next setup. The error is diagnostic only.
    Failed(Option<SharedError>),
}

impl PlaybackState {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NotReady => "not_ready",
            Self::Setup(_) => "setup",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Finished => "finished",
            Self::Failed(_) => "failed",
        }
    }

    /// The carried error, if any.
    pub fn error(&self) -> Option<&SharedError> {
        match self {
            Self::Failed(error) => error.as_ref(),
            _ => None,
        }
    }
}

// Failed states compare equal whatever error they carry.
impl PartialEq for PlaybackState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotReady, Self::NotReady)
            | (Self::Playing, Self::Playing)
            | (Self::Paused, Self::Paused)
            | (Self::Finished, Self::Finished)
            | (Self::Failed(_), Self::Failed(_)) => true,
            (Self::Setup(a), Self::Setup(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Setup(asset) => write!(f, "setup({})", asset.locator()),
            Self::Failed(Some(error)) => write!(f, "failed({error})"),
            other => f.write_str(other.name()),
        }
    }
}
