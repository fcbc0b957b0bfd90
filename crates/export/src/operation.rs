//! One cancellable export job.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{watch, Semaphore};

use reelkit_common::error::{ReelkitError, SharedError};
use reelkit_media::{EncodeRequest, MediaEngine, OverlayDescriptor, VideoAsset};

/// Terminal result of an operation.
pub type ExportOutcome = Result<PathBuf, SharedError>;

type ProgressObserver = Box<dyn Fn(f64) + Send + Sync>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique operation id.
pub(crate) fn next_operation_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Handle to one export of a [`VideoAsset`] to one output file.
///
/// Clones share the same operation. Progress is monotonic in `[0, 1]`.
///
/// Cancelling kills the encoder as soon as the engine notices. The partial
/// output file, if any, is left on disk for the caller to discard.
#[derive(Clone)]
pub struct ExportOperation {
    inner: Arc<Inner>,
}

struct Inner {
    id: u64,
    request: EncodeRequest,
    progress: watch::Sender<f64>,
    /// Held while delivering progress and while cancelling or finishing.
    gate: Mutex<Gate>,
    cancelled: AtomicBool,
    result: watch::Sender<Option<ExportOutcome>>,
}

#[derive(Default)]
struct Gate {
    observer: Option<ProgressObserver>,
    finished: bool,
}

impl ExportOperation {
    pub(crate) fn new(id: u64, request: EncodeRequest) -> Self {
        let (progress, _) = watch::channel(0.0);
        let (result, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                id,
                request,
                progress,
                gate: Mutex::new(Gate::default()),
                cancelled: AtomicBool::new(false),
                result,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn input(&self) -> &VideoAsset {
        &self.inner.request.input
    }

    pub fn overlay(&self) -> Option<&OverlayDescriptor> {
        self.inner.request.overlay.as_ref()
    }

    /// Destination file. Unique per operation.
    pub fn output(&self) -> &Path {
        &self.inner.request.output
    }

    /// Latest progress value.
    pub fn progress(&self) -> f64 {
        *self.inner.progress.borrow()
    }

    /// Receiver that observes progress updates.
    pub fn subscribe_progress(&self) -> watch::Receiver<f64> {
        self.inner.progress.subscribe()
    }

    /// Call `observer` on every progress update from now on.
    ///
    /// The observer runs on the encode worker and must not cancel this
    /// operation from inside the callback.
    pub fn set_progress_observer(&self, observer: impl Fn(f64) + Send + Sync + 'static) {
        lock(&self.inner.gate).observer = Some(Box::new(observer));
    }

    /// Request cancellation. Returns `false` if the operation already
    /// finished.
    ///
    /// Once this returns no progress observer or result callback fires
    /// for this operation, and its result resolves to
    /// `ReelkitError::Cancelled`.
    pub fn cancel(&self) -> bool {
        let mut gate = lock(&self.inner.gate);
        if gate.finished {
            return false;
        }
        self.inner.cancelled.store(true, Ordering::SeqCst);
        gate.observer = None;
        tracing::info!(operation = self.inner.id, "Export cancelled");
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.inner.result.borrow().is_some()
    }

    /// Terminal result, once available.
    pub fn result(&self) -> Option<ExportOutcome> {
        self.inner.result.borrow().clone()
    }

    /// Wait for the terminal result.
    pub async fn wait(&self) -> ExportOutcome {
        let mut rx = self.inner.result.subscribe();
        let outcome = rx.wait_for(Option::is_some).await;
        match outcome {
            Ok(result) => result
                .clone()
                .unwrap_or_else(|| Err(ReelkitError::encode("export finished without a result").shared())),
            Err(_) => Err(ReelkitError::encode("export operation dropped").shared()),
        }
    }

    fn report_progress(&self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let gate = lock(&self.inner.gate);
        if self.is_cancelled() {
            return;
        }
        let value = value.clamp(0.0, 1.0);
        let advanced = self.inner.progress.send_if_modified(|current| {
            if value > *current {
                *current = value;
                true
            } else {
                false
            }
        });
        if advanced {
            if let Some(observer) = gate.observer.as_ref() {
                observer(value);
            }
        }
    }

    /// Record the terminal result; a cancelled operation always resolves
    /// to `Cancelled`.
    fn finish(&self, outcome: ExportOutcome) -> ExportOutcome {
        let mut gate = lock(&self.inner.gate);
        let outcome = if self.is_cancelled() {
            Err(ReelkitError::Cancelled.shared())
        } else {
            outcome
        };
        gate.finished = true;
        gate.observer = None;
        self.inner.result.send_replace(Some(outcome.clone()));
        outcome
    }

    /// Encode on a blocking worker once a permit is available.
    pub(crate) async fn run(
        self,
        engine: Arc<dyn MediaEngine>,
        permits: Arc<Semaphore>,
    ) -> ExportOutcome {
        let _permit = match permits.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return self.finish(Err(
                    ReelkitError::encode("export scheduler is shut down").shared()
                ))
            }
        };
        if self.is_cancelled() {
            return self.finish(Err(ReelkitError::Cancelled.shared()));
        }

        let id = self.inner.id;
        tracing::info!(
            operation = id,
            range = %self.inner.request.input.range(),
            output = %self.inner.request.output.display(),
            overlay = self.inner.request.overlay.is_some(),
            "Export started"
        );

        let worker = self.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let report = |value: f64| worker.report_progress(value);
            engine.encode(&worker.inner.request, &report, &worker.inner.cancelled)
        })
        .await;

        let result = match joined {
            Ok(result) => result,
            Err(e) => Err(ReelkitError::encode(format!("export worker failed: {e}"))),
        };

        match &result {
            Ok(path) => {
                self.report_progress(1.0);
                tracing::info!(operation = id, output = %path.display(), "Export finished");
            }
            Err(e) if e.is_cancelled() => {
                tracing::debug!(operation = id, "Export stopped after cancellation");
            }
            Err(e) => tracing::warn!(operation = id, error = %e, "Export failed"),
        }

        self.finish(result.map_err(ReelkitError::shared))
    }
}

impl std::fmt::Debug for ExportOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportOperation")
            .field("id", &self.inner.id)
            .field("output", &self.inner.request.output)
            .field("progress", &self.progress())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelkit_media::{Asset, AssetInfo, EncoderSettings, Locator, NaturalSize};
    use std::sync::atomic::AtomicUsize;

    fn operation() -> ExportOperation {
        let asset = Asset::new(
            Locator::file("/videos/a.mp4"),
            AssetInfo {
                duration_secs: 10.0,
                natural_size: NaturalSize::new(1280, 720),
                playable: true,
                has_audio: true,
            },
        );
        ExportOperation::new(
            next_operation_id(),
            EncodeRequest {
                input: VideoAsset::new(asset).unwrap(),
                overlay: None,
                output: PathBuf::from("/tmp/reelkit-op-test.mp4"),
                encoder: EncoderSettings::default(),
            },
        )
    }

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let op = operation();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        op.set_progress_observer(move |p| s.lock().unwrap().push(p));

        for value in [0.2, 0.1, 0.5, f64::NAN, 1.7, 0.9] {
            op.report_progress(value);
        }
        assert_eq!(op.progress(), 1.0);
        assert_eq!(*seen.lock().unwrap(), vec![0.2, 0.5, 1.0]);
    }

    #[test]
    fn test_cancel_silences_observer_and_overrides_result() {
        let op = operation();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        op.set_progress_observer(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        op.report_progress(0.3);
        assert!(op.cancel());
        op.report_progress(0.6);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(op.progress(), 0.3);

        let outcome = op.finish(Ok(PathBuf::from("/tmp/x.mp4")));
        assert!(outcome.unwrap_err().is_cancelled());
        assert!(op.is_finished());
    }

    #[test]
    fn test_cancel_after_finish_is_rejected() {
        let op = operation();
        op.finish(Ok(PathBuf::from("/tmp/x.mp4")));
        assert!(!op.cancel());
        assert!(!op.is_cancelled());
        assert_eq!(op.result().unwrap().unwrap(), PathBuf::from("/tmp/x.mp4"));
    }

    #[tokio::test]
    async fn test_progress_subscribers_see_latest_value() {
        let op = operation();
        let mut rx = op.subscribe_progress();
        assert_eq!(*rx.borrow_and_update(), 0.0);

        op.report_progress(0.4);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 0.4);

        op.report_progress(0.2);
        assert!(!rx.has_changed().unwrap());
        op.report_progress(0.7);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow(), 0.7);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(operation().id(), operation().id());
    }
}
