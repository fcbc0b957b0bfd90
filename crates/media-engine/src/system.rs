//! The system engine: ffprobe for probing, GStreamer for playback, ffmpeg
//! for encoding.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use reelkit_common::config::{AppConfig, PlaybackDefaults};
use reelkit_common::error::{ReelkitError, ReelkitResult};
use reelkit_media::{
    Asset, EncodeRequest, Locator, MediaEngine, PlaybackCallback, PlaybackSession, ProgressFn,
};

use crate::ffmpeg::{command_exists, encode_with_ffmpeg, probe_asset};
use crate::playback::{gstreamer_available, GstPlaybackSession};

/// Engine backed by the media tools installed on the host.
#[derive(Debug, Clone)]
pub struct SystemEngine {
    resources_dir: PathBuf,
    playback: PlaybackDefaults,
    max_parallel_jobs: usize,
}

impl SystemEngine {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            resources_dir: config.resources_dir.clone(),
            playback: config.playback.clone(),
            max_parallel_jobs: config.export.max_parallel_jobs.max(1),
        }
    }

    pub fn resources_dir(&self) -> &Path {
        &self.resources_dir
    }

    fn resolve(&self, locator: &Locator) -> PathBuf {
        locator.resolve(&self.resources_dir)
    }

    /// Whether playback through GStreamer is usable on this host.
    pub fn playback_available(&self) -> bool {
        gstreamer_available()
    }
}

impl MediaEngine for SystemEngine {
    fn name(&self) -> &str {
        "system"
    }

    fn is_available(&self) -> bool {
        command_exists("ffmpeg") && command_exists("ffprobe")
    }

    fn open(&self, locator: &Locator) -> ReelkitResult<Asset> {
        let path = self.resolve(locator);
        let info = probe_asset(&path).map_err(|e| match e {
            ReelkitError::AssetOpen { .. } => e,
            other => ReelkitError::asset_open(locator, other.to_string()),
        })?;
        tracing::debug!(
            locator = %locator,
            duration_secs = info.duration_secs,
            size = %info.natural_size,
            "Opened asset"
        );
        Ok(Asset::new(locator.clone(), info))
    }

    fn start_playback(
        &self,
        asset: &Asset,
        events: PlaybackCallback,
    ) -> ReelkitResult<Box<dyn PlaybackSession>> {
        if !asset.is_playable() {
            return Err(ReelkitError::asset_open(asset.locator(), "asset is not playable"));
        }
        let path = self.resolve(asset.locator());
        let session = GstPlaybackSession::open(&path, asset.duration(), &self.playback, events)?;
        Ok(Box::new(session))
    }

    fn encode(
        &self,
        request: &EncodeRequest,
        progress: ProgressFn<'_>,
        cancel: &AtomicBool,
    ) -> ReelkitResult<PathBuf> {
        let source = self.resolve(request.input.asset().locator());
        tracing::info!(
            source = %source.display(),
            output = %request.output.display(),
            range = %request.input.range(),
            overlay = request.overlay.is_some(),
            "Encoding"
        );
        encode_with_ffmpeg(request, &source, progress, cancel)
    }

    fn max_concurrent_encodes(&self) -> Option<usize> {
        Some(self.max_parallel_jobs)
    }
}
