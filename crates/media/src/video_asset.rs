//! An asset paired with the active time range to play or export.

use serde::{Deserialize, Serialize};

use reelkit_common::error::{ReelkitError, ReelkitResult};

use crate::asset::Asset;
use crate::time_range::TimeRange;

/// An [`Asset`] trimmed to a [`TimeRange`].
///
/// Values are never mutated; the `change_*` methods return new values.
/// The range never extends past the asset's duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoAsset {
    asset: Asset,
    range: TimeRange,
}

impl VideoAsset {
    /// Cover the asset's full duration.
    pub fn new(asset: Asset) -> ReelkitResult<Self> {
        let range = TimeRange::new(0.0, asset.duration()).map_err(|e| {
            ReelkitError::configuration(format!(
                "asset {} has no usable duration: {e}",
                asset.locator()
            ))
        })?;
        Ok(Self { asset, range })
    }

    /// Use an explicit range; `range.end()` must not exceed the asset duration.
    pub fn with_range(asset: Asset, range: TimeRange) -> ReelkitResult<Self> {
        if range.end() > asset.duration() {
            return Err(ReelkitError::configuration(format!(
                "range {range} ends after asset duration {:.3}s",
                asset.duration()
            )));
        }
        Ok(Self { asset, range })
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn start_time(&self) -> f64 {
        self.range.start()
    }

    pub fn end_time(&self) -> f64 {
        self.range.end()
    }

    /// Length of the active range.
    pub fn duration(&self) -> f64 {
        self.range.duration()
    }

    /// New value with only the start moved.
    pub fn change_start_time(&self, secs: f64) -> ReelkitResult<Self> {
        let range = TimeRange::new(secs, self.range.end())?;
        Ok(Self {
            asset: self.asset.clone(),
            range,
        })
    }

    /// New value with only the end moved. Ends past the asset duration are
    /// clamped to the duration.
    pub fn change_end_time(&self, secs: f64) -> ReelkitResult<Self> {
        let end = if secs > self.asset.duration() {
            tracing::debug!(
                requested = secs,
                duration = self.asset.duration(),
                "Clamping end time to asset duration"
            );
            self.asset.duration()
        } else {
            secs
        };
        let range = TimeRange::new(self.range.start(), end)?;
        Ok(Self {
            asset: self.asset.clone(),
            range,
        })
    }

    /// Split the active range into consecutive clips of `clip_length`
    /// seconds, each sharing this value's asset.
    pub fn generate_clipped_assets(&self, clip_length: f64) -> ReelkitResult<Vec<VideoAsset>> {
        let clips = self
            .range
            .split(clip_length)?
            .into_iter()
            .map(|range| VideoAsset {
                asset: self.asset.clone(),
                range,
            })
            .collect();
        Ok(clips)
    }
}
