//! GStreamer `playbin` playback sessions.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Instant;

use gst::prelude::*;
use gstreamer as gst;

use reelkit_common::clock::{ns_to_secs, secs_to_ns, EmitThrottle};
use reelkit_common::config::PlaybackDefaults;
use reelkit_common::error::{ReelkitError, ReelkitResult};
use reelkit_media::{PlaybackCallback, PlaybackEvent, PlaybackSession};

/// A playback session driven by a GStreamer `playbin`.
///
/// A watcher thread polls the pipeline bus and reports position, end of
/// stream and errors through the session callback.
pub struct GstPlaybackSession {
    playbin: gst::Element,
    rate: f32,
    applied_rate: f32,
    playing: bool,
    stop_flag: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl GstPlaybackSession {
    /// Preroll `path` in the paused state and start the bus watcher.
    pub fn open(
        path: &Path,
        duration_secs: f64,
        settings: &PlaybackDefaults,
        events: PlaybackCallback,
    ) -> ReelkitResult<Self> {
        init_gstreamer()?;

        let absolute = path
            .canonicalize()
            .map_err(|e| ReelkitError::asset_open(path.display(), e.to_string()))?;
        let uri = gst::glib::filename_to_uri(&absolute, None)
            .map_err(|e| ReelkitError::asset_open(path.display(), e.to_string()))?;

        let playbin = gst::ElementFactory::make("playbin")
            .property("uri", uri.as_str())
            .build()
            .map_err(|e| ReelkitError::playback(format!("Failed to create playbin: {e}")))?;

        if settings.headless {
            for sink_property in ["video-sink", "audio-sink"] {
                let sink = gst::ElementFactory::make("fakesink")
                    .property("sync", true)
                    .build()
                    .map_err(|e| ReelkitError::playback(format!("Failed to create fakesink: {e}")))?;
                playbin.set_property(sink_property, &sink);
            }
        }

        playbin
            .set_state(gst::State::Paused)
            .map_err(|e| ReelkitError::playback(format!("Failed to preroll {}: {e:?}", path.display())))?;
        if let (Err(e), _, _) = playbin.state(gst::ClockTime::from_seconds(10)) {
            playbin.set_state(gst::State::Null).ok();
            return Err(ReelkitError::playback(format!(
                "Pipeline for {} failed to preroll: {e:?}",
                path.display()
            )));
        }

        let stop_flag = Arc::new(AtomicBool::new(false));
        let watcher = {
            let playbin = playbin.clone();
            let stop_flag = stop_flag.clone();
            let interval_ms = settings.position_interval_ms.max(10);
            std::thread::Builder::new()
                .name("reelkit-gst-bus".to_string())
                .spawn(move || watch_bus(playbin, duration_secs, interval_ms, stop_flag, events))?
        };

        tracing::info!(path = %absolute.display(), duration_secs, "GStreamer session prerolled");

        Ok(Self {
            playbin,
            rate: 1.0,
            applied_rate: 1.0,
            playing: false,
            stop_flag,
            watcher: Some(watcher),
        })
    }

    fn apply_rate(&mut self) -> ReelkitResult<()> {
        let position = self
            .playbin
            .query_position::<gst::ClockTime>()
            .unwrap_or(gst::ClockTime::ZERO);
        self.seek_at_rate(position)
            .map_err(|e| ReelkitError::playback(format!("Failed to set rate {}: {e}", self.rate)))
    }

    /// Flush-seek to `position` carrying the requested rate, so a seek never
    /// drops the pipeline back to normal speed.
    fn seek_at_rate(&mut self, position: gst::ClockTime) -> Result<(), gst::glib::BoolError> {
        let (start, stop) = rate_segment(self.rate, position);
        self.playbin.seek(
            self.rate as f64,
            gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE,
            gst::SeekType::Set,
            start,
            stop.map_or(gst::SeekType::End, |_| gst::SeekType::Set),
            stop.unwrap_or(gst::ClockTime::ZERO),
        )?;
        self.applied_rate = self.rate;
        Ok(())
    }
}

/// Segment bounds for a seek at `rate` from `position`: forward playback
/// runs from the position to the end, reverse playback from zero up to it.
fn rate_segment(rate: f32, position: gst::ClockTime) -> (gst::ClockTime, Option<gst::ClockTime>) {
    if rate > 0.0 {
        (position, None)
    } else {
        (gst::ClockTime::ZERO, Some(position))
    }
}

impl PlaybackSession for GstPlaybackSession {
    fn play(&mut self, rate: f32) -> ReelkitResult<()> {
        self.playbin
            .set_state(gst::State::Playing)
            .map_err(|e| ReelkitError::playback(format!("Failed to start playback: {e:?}")))?;
        self.playing = true;
        self.rate = rate;
        if (self.rate - self.applied_rate).abs() > f32::EPSILON {
            self.apply_rate()?;
        }
        Ok(())
    }

    fn pause(&mut self) -> ReelkitResult<()> {
        self.playbin
            .set_state(gst::State::Paused)
            .map_err(|e| ReelkitError::playback(format!("Failed to pause playback: {e:?}")))?;
        self.playing = false;
        Ok(())
    }

    fn seek(&mut self, secs: f64) -> ReelkitResult<()> {
        self.seek_at_rate(gst::ClockTime::from_nseconds(secs_to_ns(secs)))
            .map_err(|e| ReelkitError::playback(format!("Failed to seek to {secs:.3}s: {e}")))
    }

    fn set_rate(&mut self, rate: f32) -> ReelkitResult<()> {
        if rate == 0.0 || !rate.is_finite() {
            return Err(ReelkitError::configuration(format!("invalid playback rate {rate}")));
        }
        self.rate = rate;
        if self.playing {
            self.apply_rate()?;
        }
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> ReelkitResult<()> {
        self.playbin
            .set_property("volume", volume.clamp(0.0, 1.0) as f64);
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) -> ReelkitResult<()> {
        self.playbin.set_property("mute", muted);
        Ok(())
    }

    fn stop(&mut self) -> ReelkitResult<()> {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(watcher) = self.watcher.take() {
            if watcher.join().is_err() {
                tracing::warn!("GStreamer bus watcher panicked");
            }
        }
        self.playbin
            .set_state(gst::State::Null)
            .map_err(|e| ReelkitError::playback(format!("Failed to release pipeline: {e:?}")))?;
        self.playing = false;
        Ok(())
    }
}

impl Drop for GstPlaybackSession {
    fn drop(&mut self) {
        if self.watcher.is_some() {
            if let Err(e) = self.stop() {
                tracing::warn!(error = %e, "Failed to stop GStreamer session on drop");
            }
        }
    }
}

fn watch_bus(
    playbin: gst::Element,
    duration_secs: f64,
    interval_ms: u64,
    stop_flag: Arc<AtomicBool>,
    events: PlaybackCallback,
) {
    let Some(bus) = playbin.bus() else {
        events(PlaybackEvent::Failed {
            message: "playbin has no bus".to_string(),
        });
        return;
    };

    let started = Instant::now();
    let mut throttle = EmitThrottle::new((1000 / interval_ms).max(1) as u32);
    let mut buffered_percent = 100;

    while !stop_flag.load(Ordering::SeqCst) {
        let mut ended = false;
        if let Some(msg) = bus.timed_pop(gst::ClockTime::from_mseconds(interval_ms)) {
            match msg.view() {
                gst::MessageView::Eos(_) => ended = true,
                gst::MessageView::Error(err) => {
                    if !stop_flag.load(Ordering::SeqCst) {
                        events(PlaybackEvent::Failed {
                            message: err.error().to_string(),
                        });
                    }
                    return;
                }
                gst::MessageView::Buffering(b) => buffered_percent = b.percent(),
                _ => {}
            }
        }

        if stop_flag.load(Ordering::SeqCst) {
            break;
        }

        let now_ns = started.elapsed().as_nanos() as u64;
        if ended || throttle.should_emit(now_ns) {
            if let Some(position) = playbin.query_position::<gst::ClockTime>() {
                let current_secs = ns_to_secs(position.nseconds());
                let buffered_secs =
                    (duration_secs * buffered_percent as f64 / 100.0).max(current_secs);
                events(PlaybackEvent::Position {
                    current_secs,
                    buffered_secs,
                });
            }
        }
        if ended {
            events(PlaybackEvent::Ended);
        }
    }
}

fn init_gstreamer() -> ReelkitResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(ReelkitError::playback(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

/// Whether GStreamer initializes and provides `playbin`.
pub fn gstreamer_available() -> bool {
    init_gstreamer().is_ok() && gst::ElementFactory::find("playbin").is_some()
}
