//! A deterministic in-process Media Engine.
//!
//! Media is registered up front with a duration and frame size. Playback
//! advances a virtual clock on a Tokio ticker; encodes step through
//! progress and write a small JSON manifest describing the rendered clip,
//! which [`SyntheticEngine::open`] can read back. Failures can be scripted
//! for both paths.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use reelkit_common::error::{ReelkitError, ReelkitResult};
use reelkit_media::{
    Asset, AssetInfo, EncodeRequest, Locator, MediaEngine, NaturalSize, PlaybackCallback,
    PlaybackEvent, PlaybackSession, ProgressFn,
};

const MANIFEST_FORMAT: &str = "reelkit-synthetic/1";

/// A registered piece of synthetic media.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticMedia {
    pub duration_secs: f64,
    pub natural_size: NaturalSize,
    pub playable: bool,
    pub has_audio: bool,
    /// Playback reports a fatal error once the position reaches this point.
    pub fail_playback_at: Option<f64>,
}

impl SyntheticMedia {
    pub fn new(duration_secs: f64, width: u32, height: u32) -> Self {
        Self {
            duration_secs,
            natural_size: NaturalSize::new(width, height),
            playable: true,
            has_audio: true,
            fail_playback_at: None,
        }
    }

    pub fn unplayable(mut self) -> Self {
        self.playable = false;
        self
    }

    pub fn failing_at(mut self, secs: f64) -> Self {
        self.fail_playback_at = Some(secs);
        self
    }

    fn info(&self) -> AssetInfo {
        AssetInfo {
            duration_secs: self.duration_secs,
            natural_size: self.natural_size,
            playable: self.playable,
            has_audio: self.has_audio,
        }
    }
}

/// Timing knobs for the synthetic engine.
#[derive(Debug, Clone)]
pub struct SyntheticSettings {
    /// Interval between playback clock ticks.
    pub tick: Duration,
    /// Virtual seconds that elapse per real second of playback.
    pub playback_speed: f64,
    /// Progress steps per encode.
    pub encode_steps: u32,
    /// Sleep between encode steps.
    pub encode_step_delay: Duration,
    /// Reported concurrency limit.
    pub max_concurrent_encodes: Option<usize>,
}

impl Default for SyntheticSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(20),
            playback_speed: 1.0,
            encode_steps: 10,
            encode_step_delay: Duration::from_millis(5),
            max_concurrent_encodes: None,
        }
    }
}

type EncodeFailure = Arc<dyn Fn(&EncodeRequest) -> Option<String> + Send + Sync>;

/// On-disk description of a synthetic render.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RenderedManifest {
    format: String,
    source: Locator,
    start_secs: f64,
    end_secs: f64,
    natural_size: NaturalSize,
    has_audio: bool,
    overlay: Option<PathBuf>,
}

/// In-process engine with registered media and scripted failures.
pub struct SyntheticEngine {
    settings: SyntheticSettings,
    media: Mutex<HashMap<Locator, SyntheticMedia>>,
    encode_failure: Mutex<Option<EncodeFailure>>,
    active_encodes: AtomicUsize,
    peak_encodes: AtomicUsize,
}

impl SyntheticEngine {
    pub fn new(settings: SyntheticSettings) -> Self {
        Self {
            settings,
            media: Mutex::new(HashMap::new()),
            encode_failure: Mutex::new(None),
            active_encodes: AtomicUsize::new(0),
            peak_encodes: AtomicUsize::new(0),
        }
    }

    pub fn with_media(self, locator: Locator, media: SyntheticMedia) -> Self {
        self.register(locator, media);
        self
    }

    pub fn register(&self, locator: Locator, media: SyntheticMedia) {
        lock(&self.media).insert(locator, media);
    }

    /// Fail every encode for which `rule` returns a message.
    pub fn fail_encodes_where(
        &self,
        rule: impl Fn(&EncodeRequest) -> Option<String> + Send + Sync + 'static,
    ) {
        *lock(&self.encode_failure) = Some(Arc::new(rule));
    }

    /// Highest number of encodes observed running at the same time.
    pub fn peak_concurrent_encodes(&self) -> usize {
        self.peak_encodes.load(Ordering::SeqCst)
    }

    fn read_manifest(path: &Path) -> ReelkitResult<RenderedManifest> {
        let content = std::fs::read_to_string(path)?;
        let manifest: RenderedManifest = serde_json::from_str(&content)?;
        if manifest.format != MANIFEST_FORMAT {
            return Err(ReelkitError::unsupported(format!(
                "unknown manifest format {}",
                manifest.format
            )));
        }
        Ok(manifest)
    }

    fn run_encode(
        &self,
        request: &EncodeRequest,
        progress: ProgressFn<'_>,
        cancel: &AtomicBool,
    ) -> ReelkitResult<PathBuf> {
        let source = request.input.asset().locator();
        if !lock(&self.media).contains_key(source) {
            return Err(ReelkitError::encode(format!("unknown synthetic source {source}")));
        }

        let failure = lock(&self.encode_failure)
            .as_ref()
            .and_then(|rule| rule(request));
        let steps = self.settings.encode_steps.max(1);

        for step in 1..=steps {
            if cancel.load(Ordering::SeqCst) {
                return Err(ReelkitError::Cancelled);
            }
            std::thread::sleep(self.settings.encode_step_delay);
            if let Some(message) = &failure {
                if step * 2 > steps {
                    return Err(ReelkitError::encode(message.clone()));
                }
            }
            progress(step as f64 / steps as f64);
        }

        if cancel.load(Ordering::SeqCst) {
            return Err(ReelkitError::Cancelled);
        }

        let manifest = RenderedManifest {
            format: MANIFEST_FORMAT.to_string(),
            source: source.clone(),
            start_secs: request.input.start_time(),
            end_secs: request.input.end_time(),
            natural_size: request.input.asset().natural_size(),
            has_audio: request.input.asset().info().has_audio,
            overlay: request.overlay.as_ref().map(|o| o.image.clone()),
        };
        if let Some(parent) = request.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&request.output, serde_json::to_string_pretty(&manifest)?)?;
        Ok(request.output.clone())
    }
}

impl Default for SyntheticEngine {
    fn default() -> Self {
        Self::new(SyntheticSettings::default())
    }
}

impl MediaEngine for SyntheticEngine {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn open(&self, locator: &Locator) -> ReelkitResult<Asset> {
        if let Some(media) = lock(&self.media).get(locator) {
            return Ok(Asset::new(locator.clone(), media.info()));
        }

        let Locator::File(path) = locator else {
            return Err(ReelkitError::asset_open(locator, "resource is not registered"));
        };
        let manifest = Self::read_manifest(path)
            .map_err(|e| ReelkitError::asset_open(locator, e.to_string()))?;

        Ok(Asset::new(
            locator.clone(),
            AssetInfo {
                duration_secs: manifest.end_secs - manifest.start_secs,
                natural_size: manifest.natural_size,
                playable: true,
                has_audio: manifest.has_audio,
            },
        ))
    }

    fn start_playback(
        &self,
        asset: &Asset,
        events: PlaybackCallback,
    ) -> ReelkitResult<Box<dyn PlaybackSession>> {
        if !asset.is_playable() {
            return Err(ReelkitError::asset_open(asset.locator(), "asset is not playable"));
        }
        let fail_at = lock(&self.media)
            .get(asset.locator())
            .and_then(|m| m.fail_playback_at);
        let session = ClockedSession::start(
            asset.duration(),
            fail_at,
            self.settings.tick,
            self.settings.playback_speed,
            events,
        )?;
        Ok(Box::new(session))
    }

    fn encode(
        &self,
        request: &EncodeRequest,
        progress: ProgressFn<'_>,
        cancel: &AtomicBool,
    ) -> ReelkitResult<PathBuf> {
        let active = self.active_encodes.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_encodes.fetch_max(active, Ordering::SeqCst);
        let result = self.run_encode(request, progress, cancel);
        self.active_encodes.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn max_concurrent_encodes(&self) -> Option<usize> {
        self.settings.max_concurrent_encodes
    }
}

#[derive(Debug)]
struct ClockState {
    position: f64,
    rate: f32,
    playing: bool,
    volume: f32,
    muted: bool,
    stopped: bool,
}

/// Playback against a virtual clock advanced by a Tokio ticker.
pub struct ClockedSession {
    state: Arc<Mutex<ClockState>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl ClockedSession {
    /// Start a paused session. Must be called inside a Tokio runtime.
    pub fn start(
        duration_secs: f64,
        fail_at: Option<f64>,
        tick: Duration,
        speed: f64,
        events: PlaybackCallback,
    ) -> ReelkitResult<Self> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| ReelkitError::playback("clocked playback needs a Tokio runtime"))?;

        let state = Arc::new(Mutex::new(ClockState {
            position: 0.0,
            rate: 1.0,
            playing: false,
            volume: 1.0,
            muted: false,
            stopped: false,
        }));

        let task = handle.spawn(run_clock(
            state.clone(),
            duration_secs,
            fail_at,
            tick,
            speed,
            events,
        ));

        Ok(Self {
            state,
            task: Some(task),
        })
    }

    /// Current virtual position.
    pub fn position(&self) -> f64 {
        lock(&self.state).position
    }

    pub fn volume(&self) -> f32 {
        lock(&self.state).volume
    }

    pub fn is_muted(&self) -> bool {
        lock(&self.state).muted
    }
}

async fn run_clock(
    state: Arc<Mutex<ClockState>>,
    duration_secs: f64,
    fail_at: Option<f64>,
    tick: Duration,
    speed: f64,
    events: PlaybackCallback,
) {
    let mut interval = tokio::time::interval(tick);
    let step_secs = tick.as_secs_f64() * speed;

    loop {
        interval.tick().await;

        // Events are emitted under the lock so `stop` can guarantee silence.
        let mut s = lock(&state);
        if s.stopped {
            return;
        }
        if !s.playing {
            continue;
        }

        s.position = (s.position + s.rate as f64 * step_secs).clamp(0.0, duration_secs);

        if let Some(fail_at) = fail_at {
            if s.position >= fail_at {
                s.playing = false;
                events(PlaybackEvent::Failed {
                    message: format!("synthetic decode fault at {:.3}s", s.position),
                });
                return;
            }
        }

        events(PlaybackEvent::Position {
            current_secs: s.position,
            buffered_secs: duration_secs,
        });

        let at_end = s.rate > 0.0 && s.position >= duration_secs;
        let at_start = s.rate < 0.0 && s.position <= 0.0;
        if at_end || at_start {
            s.playing = false;
            events(PlaybackEvent::Ended);
        }
    }
}

impl PlaybackSession for ClockedSession {
    fn play(&mut self, rate: f32) -> ReelkitResult<()> {
        let mut s = lock(&self.state);
        s.rate = rate;
        s.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> ReelkitResult<()> {
        lock(&self.state).playing = false;
        Ok(())
    }

    fn seek(&mut self, secs: f64) -> ReelkitResult<()> {
        lock(&self.state).position = secs.max(0.0);
        Ok(())
    }

    fn set_rate(&mut self, rate: f32) -> ReelkitResult<()> {
        if rate == 0.0 || !rate.is_finite() {
            return Err(ReelkitError::configuration(format!("invalid playback rate {rate}")));
        }
        lock(&self.state).rate = rate;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> ReelkitResult<()> {
        lock(&self.state).volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) -> ReelkitResult<()> {
        lock(&self.state).muted = muted;
        Ok(())
    }

    fn stop(&mut self) -> ReelkitResult<()> {
        {
            let mut s = lock(&self.state);
            s.stopped = true;
            s.playing = false;
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }
}

impl Drop for ClockedSession {
    fn drop(&mut self) {
        self.stop().ok();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelkit_media::{EncoderSettings, VideoAsset};
    use tokio::sync::mpsc;

    fn sample_locator() -> Locator {
        Locator::resource("SampleVideo_1280x720_5mb", "mp4")
    }

    fn engine() -> SyntheticEngine {
        SyntheticEngine::new(SyntheticSettings {
            tick: Duration::from_millis(5),
            playback_speed: 20.0,
            encode_steps: 4,
            encode_step_delay: Duration::from_millis(1),
            max_concurrent_encodes: None,
        })
        .with_media(sample_locator(), SyntheticMedia::new(29.568, 1280, 720))
    }

    fn request(engine: &SyntheticEngine, output: PathBuf) -> EncodeRequest {
        let asset = engine.open(&sample_locator()).unwrap();
        EncodeRequest {
            input: VideoAsset::new(asset)
                .unwrap()
                .change_start_time(5.0)
                .unwrap()
                .change_end_time(10.0)
                .unwrap(),
            overlay: None,
            output,
            encoder: EncoderSettings::default(),
        }
    }

    #[test]
    fn test_open_registered_and_unknown() {
        let engine = engine();
        let asset = engine.open(&sample_locator()).unwrap();
        assert_eq!(asset.natural_size(), NaturalSize::new(1280, 720));
        assert_eq!(asset.duration(), 29.568);

        let err = engine
            .open(&Locator::resource("missing", "mp4"))
            .unwrap_err();
        assert!(matches!(err, ReelkitError::AssetOpen { .. }));
    }

    #[test]
    fn test_encode_writes_readable_manifest() {
        let engine = engine();
        let output = std::env::temp_dir().join("reelkit_synthetic_encode_test.mp4");
        let _ = std::fs::remove_file(&output);

        let progress = Mutex::new(Vec::new());
        let report = |p: f64| progress.lock().unwrap().push(p);
        let cancel = AtomicBool::new(false);
        let written = engine
            .encode(&request(&engine, output.clone()), &report, &cancel)
            .unwrap();
        assert_eq!(written, output);

        let values = progress.into_inner().unwrap();
        assert_eq!(values, vec![0.25, 0.5, 0.75, 1.0]);

        let exported = engine.open(&Locator::file(&output)).unwrap();
        assert_eq!(exported.duration(), 5.0);
        assert_eq!(exported.natural_size(), NaturalSize::new(1280, 720));

        std::fs::remove_file(&output).ok();
    }

    #[test]
    fn test_encode_honours_cancel_and_failures() {
        let engine = engine();
        let output = std::env::temp_dir().join("reelkit_synthetic_cancel_test.mp4");
        let _ = std::fs::remove_file(&output);

        let cancel = AtomicBool::new(true);
        let err = engine
            .encode(&request(&engine, output.clone()), &|_: f64| {}, &cancel)
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(!output.exists());

        engine.fail_encodes_where(|_| Some("disk full".to_string()));
        let err = engine
            .encode(&request(&engine, output.clone()), &|_: f64| {}, &AtomicBool::new(false))
            .unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_clocked_session_reaches_end() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = ClockedSession::start(
            0.5,
            None,
            Duration::from_millis(5),
            10.0,
            Box::new(move |event| {
                tx.send(event).ok();
            }),
        )
        .unwrap();
        session.play(1.0).unwrap();

        let ended = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(event) = rx.recv().await {
                if event == PlaybackEvent::Ended {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap();
        assert!(ended);
        assert_eq!(session.position(), 0.5);
    }

    #[tokio::test]
    async fn test_clocked_session_is_silent_after_stop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = ClockedSession::start(
            10.0,
            None,
            Duration::from_millis(5),
            1.0,
            Box::new(move |event| {
                tx.send(event).ok();
            }),
        )
        .unwrap();
        session.play(1.0).unwrap();
        session.set_muted(true).unwrap();
        assert!(session.is_muted());
        tokio::time::sleep(Duration::from_millis(30)).await;
        session.stop().unwrap();
        while rx.try_recv().is_ok() {}

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(rx.try_recv().is_err());
    }
}
