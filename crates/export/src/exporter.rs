//! Single and multi-clip export orchestration.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use reelkit_common::config::ExportDefaults;
use reelkit_common::error::{ReelkitError, ReelkitResult, SharedError};
use reelkit_media::{EncodeRequest, EncoderSettings, MediaEngine, OverlayDescriptor, VideoAsset};

use crate::operation::{next_operation_id, ExportOperation, ExportOutcome};
use crate::queue::CallbackQueue;

type CompletedFn = Box<dyn FnOnce(Vec<PathBuf>, Vec<SharedError>) + Send + 'static>;

/// Schedules [`ExportOperation`]s against a [`MediaEngine`].
///
/// Operations run concurrently, bounded only by the engine's own limit.
pub struct VideoExporter {
    engine: Arc<dyn MediaEngine>,
    settings: ExportDefaults,
    permits: Arc<Semaphore>,
    runtime: Handle,
}

impl VideoExporter {
    /// Create an exporter that schedules onto the current Tokio runtime.
    pub fn new(engine: Arc<dyn MediaEngine>, settings: ExportDefaults) -> ReelkitResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|_| ReelkitError::configuration("VideoExporter needs a Tokio runtime"))?;
        let limit = engine
            .max_concurrent_encodes()
            .unwrap_or(Semaphore::MAX_PERMITS)
            .clamp(1, Semaphore::MAX_PERMITS);
        tracing::debug!(engine = engine.name(), limit, "Video exporter ready");

        Ok(Self {
            engine,
            settings,
            permits: Arc::new(Semaphore::new(limit)),
            runtime,
        })
    }

    pub fn settings(&self) -> &ExportDefaults {
        &self.settings
    }

    /// Export the active range of `video_asset`, preserving frame geometry.
    ///
    /// Exactly one of `success` or `failure` runs on the finishing worker,
    /// unless the operation is cancelled, in which case neither runs.
    /// Invalid overlays are rejected before anything is scheduled.
    pub fn export_video_without_crop(
        &self,
        video_asset: &VideoAsset,
        overlay: Option<OverlayDescriptor>,
        success: impl FnOnce(PathBuf) + Send + 'static,
        failure: impl FnOnce(SharedError) + Send + 'static,
    ) -> ReelkitResult<ExportOperation> {
        if let Some(overlay) = &overlay {
            overlay.validate()?;
        }
        let op = self.operation(video_asset.clone(), overlay, None);
        let task = op.clone().run(self.engine.clone(), self.permits.clone());
        let watched = op.clone();

        self.runtime.spawn(async move {
            let outcome = task.await;
            if watched.is_cancelled() {
                return;
            }
            match outcome {
                Ok(path) => success(path),
                Err(e) if e.is_cancelled() => {}
                Err(e) => failure(e),
            }
        });
        Ok(op)
    }

    /// Export and wait for the output path.
    pub async fn export_video(
        &self,
        video_asset: &VideoAsset,
        overlay: Option<OverlayDescriptor>,
    ) -> ExportOutcome {
        let op = self
            .export_video_without_crop(video_asset, overlay, |_| {}, |_| {})
            .map_err(ReelkitError::shared)?;
        op.wait().await
    }

    /// Split `video_asset` into clips of `clip_length` seconds and export
    /// them all concurrently.
    ///
    /// `completed(urls, errors)` runs exactly once on `queue` after every
    /// operation has finished. `urls` keeps clip order; a failed or
    /// cancelled clip contributes an error instead and never stops its
    /// siblings. Invalid clip lengths and overlays are rejected here.
    pub fn export_clips(
        &self,
        video_asset: &VideoAsset,
        clip_length: f64,
        queue: CallbackQueue,
        overlay: Option<OverlayDescriptor>,
        completed: impl FnOnce(Vec<PathBuf>, Vec<SharedError>) + Send + 'static,
    ) -> ReelkitResult<Vec<ExportOperation>> {
        if let Some(overlay) = &overlay {
            overlay.validate()?;
        }
        let clips = video_asset.generate_clipped_assets(clip_length)?;

        let operations: Vec<_> = clips
            .into_iter()
            .enumerate()
            .map(|(index, clip)| self.operation(clip, overlay.clone(), Some(index)))
            .collect();

        tracing::info!(
            source = %video_asset.asset().locator(),
            clip_length,
            clips = operations.len(),
            "Scheduling clip export"
        );

        let join = Arc::new(ClipJoin::new(operations.len(), queue, Box::new(completed)));
        for (index, op) in operations.iter().enumerate() {
            let task = op.clone().run(self.engine.clone(), self.permits.clone());
            let join = join.clone();
            self.runtime.spawn(async move {
                let outcome = task.await;
                join.record(index, outcome);
            });
        }

        Ok(operations)
    }

    fn operation(
        &self,
        input: VideoAsset,
        overlay: Option<OverlayDescriptor>,
        clip: Option<usize>,
    ) -> ExportOperation {
        let id = next_operation_id();
        let output = self.output_path(&input, id, clip);
        ExportOperation::new(
            id,
            EncodeRequest {
                input,
                overlay,
                output,
                encoder: EncoderSettings::from(&self.settings),
            },
        )
    }

    /// `<stem>-<UTC timestamp>-<id>[-clip<index>].<ext>` in the output dir.
    fn output_path(&self, input: &VideoAsset, id: u64, clip: Option<usize>) -> PathBuf {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
        let stem = input.asset().locator().stem();
        let ext = &self.settings.file_extension;
        let name = match clip {
            Some(index) => format!("{stem}-{stamp}-{id}-clip{index}.{ext}"),
            None => format!("{stem}-{stamp}-{id}.{ext}"),
        };
        self.settings.output_dir.join(name)
    }
}

/// Wait-for-all join over the clips of one `export_clips` call.
struct ClipJoin {
    remaining: AtomicUsize,
    results: Mutex<ClipResults>,
    completed: Mutex<Option<CompletedFn>>,
    queue: CallbackQueue,
}

#[derive(Default)]
struct ClipResults {
    urls: Vec<Option<PathBuf>>,
    errors: Vec<SharedError>,
}

impl ClipJoin {
    fn new(count: usize, queue: CallbackQueue, completed: CompletedFn) -> Self {
        let join = Self {
            remaining: AtomicUsize::new(count),
            results: Mutex::new(ClipResults {
                urls: vec![None; count],
                errors: Vec::new(),
            }),
            completed: Mutex::new(Some(completed)),
            queue,
        };
        if count == 0 {
            join.finish();
        }
        join
    }

    fn record(&self, index: usize, outcome: ExportOutcome) {
        {
            let mut results = lock(&self.results);
            match outcome {
                Ok(path) => {
                    if let Some(slot) = results.urls.get_mut(index) {
                        *slot = Some(path);
                    }
                }
                Err(e) => results.errors.push(e),
            }
        }
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.finish();
        }
    }

    fn finish(&self) {
        let Some(completed) = lock(&self.completed).take() else {
            return;
        };
        let results = std::mem::take(&mut *lock(&self.results));
        let urls: Vec<PathBuf> = results.urls.into_iter().flatten().collect();
        let errors = results.errors;
        tracing::info!(
            exported = urls.len(),
            failed = errors.len(),
            "Clip export complete"
        );
        self.queue.deliver(move || completed(urls, errors));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
