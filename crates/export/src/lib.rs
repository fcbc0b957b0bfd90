//! reelkit Export
//!
//! Renders [`VideoAsset`](reelkit_media::VideoAsset)s to files through a
//! Media Engine.
//!
//! - [`ExportOperation`]: one cancellable export with monotonic progress
//!   and a terminal result
//! - [`VideoExporter`]: single exports and multi-clip exports joined into
//!   one completion callback
//! - [`CallbackQueue`]: where completion callbacks run

pub mod exporter;
pub mod operation;
pub mod queue;

pub use exporter::VideoExporter;
pub use operation::{ExportOperation, ExportOutcome};
pub use queue::{run_pending, CallbackQueue, Job};
