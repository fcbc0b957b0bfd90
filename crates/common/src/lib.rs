//! reelkit Common Utilities
//!
//! Shared infrastructure for all reelkit crates:
//! - Error types and result aliases
//! - Time formatting and emission throttling
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
