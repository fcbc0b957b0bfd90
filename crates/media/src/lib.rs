//! reelkit Media Model
//!
//! Value types shared by playback and export, plus the contract every
//! Media Engine backend implements:
//! - **Asset:** a probed, immutable media resource behind a [`Locator`]
//! - **TimeRange / VideoAsset:** an asset trimmed to an active `[start, end)` range
//! - **Overlay:** an image composited over exported frames
//! - **Engine:** open, playback session, and encode operations
//!
//! All times are seconds as `f64`.

pub mod asset;
pub mod engine;
pub mod overlay;
pub mod time_range;
pub mod video_asset;

pub use asset::*;
pub use engine::*;
pub use overlay::*;
pub use time_range::*;
pub use video_asset::*;
