//! Read-only snapshots of a player.

use reelkit_common::clock::{format_time_left, format_time_string};
use reelkit_media::Asset;

use crate::action::SetupOptions;
use crate::state::PlaybackState;

/// Immutable view of a player at one instant.
///
/// Snapshots are values: they never update after being taken.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetPlayerProperties {
    pub asset: Option<Asset>,
    pub start_time_for_loop: f64,
    /// `None` means the loop ends with the asset.
    pub end_time_for_loop: Option<f64>,
    pub is_muted: bool,
    pub volume: f32,
    pub current_time: f64,
    pub buffered_time: f64,
    pub current_time_text: String,
    pub duration_text: String,
    pub time_left_text: String,
    pub duration: f64,
    pub rate: f32,
    pub should_loop: bool,
    pub state: PlaybackState,
}

/// Mutable per-session fields owned by the player task.
#[derive(Debug, Clone)]
pub(crate) struct SessionFields {
    pub asset: Option<Asset>,
    pub loop_start: f64,
    pub loop_end: Option<f64>,
    pub is_muted: bool,
    pub volume: f32,
    pub current_time: f64,
    pub buffered_time: f64,
    pub rate: f32,
    pub should_loop: bool,
    pub state: PlaybackState,
}

impl SessionFields {
    pub fn new() -> Self {
        Self {
            asset: None,
            loop_start: 0.0,
            loop_end: None,
            is_muted: false,
            volume: 1.0,
            current_time: 0.0,
            buffered_time: 0.0,
            rate: 1.0,
            should_loop: false,
            state: PlaybackState::NotReady,
        }
    }

    /// Fresh fields for a newly set up asset. Volume carries over.
    pub fn for_asset(&self, asset: Asset, options: SetupOptions) -> Self {
        Self {
            asset: Some(asset.clone()),
            is_muted: options.start_muted,
            should_loop: options.should_loop,
            volume: self.volume,
            state: PlaybackState::Setup(asset),
            ..Self::new()
        }
    }

    pub fn duration(&self) -> f64 {
        self.asset.as_ref().map(Asset::duration).unwrap_or(0.0)
    }

    /// Effective loop end in seconds.
    pub fn loop_end_secs(&self) -> f64 {
        self.loop_end.unwrap_or_else(|| self.duration())
    }

    pub fn properties(&self) -> AssetPlayerProperties {
        let duration = self.duration();
        AssetPlayerProperties {
            asset: self.asset.clone(),
            start_time_for_loop: self.loop_start,
            end_time_for_loop: self.loop_end,
            is_muted: self.is_muted,
            volume: self.volume,
            current_time: self.current_time,
            buffered_time: self.buffered_time,
            current_time_text: format_time_string(self.current_time),
            duration_text: format_time_string(duration),
            time_left_text: format_time_left(duration, self.current_time),
            duration,
            rate: self.rate,
            should_loop: self.should_loop,
            state: self.state.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelkit_media::{AssetInfo, Locator, NaturalSize};

    fn asset() -> Asset {
        Asset::new(
            Locator::resource("SampleVideo_1280x720_5mb", "mp4"),
            AssetInfo {
                duration_secs: 29.568,
                natural_size: NaturalSize::new(1280, 720),
                playable: true,
                has_audio: true,
            },
        )
    }

    #[test]
    fn test_initial_snapshot() {
        let props = SessionFields::new().properties();
        assert_eq!(props.state, PlaybackState::NotReady);
        assert!(props.asset.is_none());
        assert_eq!(props.duration, 0.0);
        assert_eq!(props.current_time_text, "0:00");
        assert_eq!(props.time_left_text, "-0:00");
        assert_eq!(props.rate, 1.0);
    }

    #[test]
    fn test_setup_snapshot_formats_times() {
        let mut fields = SessionFields::new().for_asset(
            asset(),
            SetupOptions {
                start_muted: true,
                should_loop: false,
            },
        );
        fields.current_time = 12.7;

        let props = fields.properties();
        assert_eq!(props.state, PlaybackState::Setup(asset()));
        assert!(props.is_muted);
        assert_eq!(props.duration_text, "0:29");
        assert_eq!(props.current_time_text, "0:12");
        assert_eq!(props.time_left_text, "-0:16");
        assert_eq!(props.end_time_for_loop, None);
        assert_eq!(fields.loop_end_secs(), 29.568);
    }

    #[test]
    fn test_for_asset_keeps_volume_only() {
        let mut fields = SessionFields::new();
        fields.volume = 0.4;
        fields.rate = 2.0;
        fields.loop_start = 3.0;

        let next = fields.for_asset(asset(), SetupOptions::default());
        assert_eq!(next.volume, 0.4);
        assert_eq!(next.rate, 1.0);
        assert_eq!(next.loop_start, 0.0);
    }
}
