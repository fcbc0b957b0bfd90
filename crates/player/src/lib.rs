//! reelkit Player
//!
//! [`AssetPlayer`] drives one playback session through a closed set of
//! [`PlayerAction`]s and publishes [`AssetPlayerProperties`] snapshots.
//!
//! ```text
//!  perform/dispatch ──► command queue ──┐
//!                                       ├──► player task ──► watch<AssetPlayerProperties>
//!  PlaybackSession ───► event queue ────┘        │
//!                                                ▼
//!                                          MediaEngine
//! ```
//!
//! State transitions:
//!
//! | From | Action / event | To |
//! |---|---|---|
//! | any | `Setup` | `Setup(asset)`, or `Failed` if the asset cannot be played |
//! | `Setup`, `Paused`, `Finished` | `Play` | `Playing` |
//! | `Playing`, `Setup` | `Pause` | `Paused` |
//! | `Playing`, `Paused` | `Stop` | `Setup(asset)` at the loop start |
//! | `Playing` | loop end reached | `Finished`, or `Playing` from the loop start when looping |
//! | any | engine failure | `Failed` until the next `Setup` |

pub mod action;
pub mod player;
pub mod properties;
pub mod state;

pub use action::{PlayerAction, SetupOptions};
pub use player::AssetPlayer;
pub use properties::AssetPlayerProperties;
pub use state::PlaybackState;
