//! reelkit Media Engines
//!
//! Implementations of [`reelkit_media::MediaEngine`]:
//!
//! - [`SystemEngine`]: probes with `ffprobe`, plays through a GStreamer
//!   `playbin`, and encodes with `ffmpeg`.
//! - [`SyntheticEngine`]: an in-process engine with registered media and a
//!   virtual playback clock. Used by tests and the `check` command.

pub mod ffmpeg;
pub mod playback;
pub mod synthetic;
pub mod system;

pub use playback::{gstreamer_available, GstPlaybackSession};
pub use synthetic::{ClockedSession, SyntheticEngine, SyntheticMedia, SyntheticSettings};
pub use system::SystemEngine;
