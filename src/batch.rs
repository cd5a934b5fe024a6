//! The batch worker: one background thread converting a queue of files.
//!
//! Files are processed one after another, never in parallel. The worker
//! reports through an [`EventSink`] and stops early in exactly two cases:
//!
//! - the [`CancelFlag`] is set (checked before each file and each page);
//! - the inference service rejects the API key. Every further call would
//!   fail the same way, so the batch ends with
//!   [`BatchStatus::InvalidCredential`].
//!
//! Any other error abandons only the file it occurred in.
//!
//! # Example
//!
//! ```rust,no_run
//! use edgequake_pdf2pptx::{spawn_batch, ConversionConfig, WorkerEvent};
//! use std::path::PathBuf;
//!
//! let config = ConversionConfig::builder().api_key("...").build().unwrap();
//! let mut handle = spawn_batch(vec![PathBuf::from("slides.pdf")], config).unwrap();
//! while let Some(event) = handle.events.blocking_recv() {
//!     if let WorkerEvent::Finished(status) = event {
//!         println!("{status:?}");
//!     }
//! }
//! ```

use crate::config::ConversionConfig;
use crate::convert::{convert_and_save, FileContext, FileOutcome};
use crate::error::Pdf2PptxError;
use crate::pipeline::analyze::{resolve_analyzer, LayoutAnalyzer};
use crate::progress::{BatchStatus, CancelFlag, EventSink, WorkerEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Run the whole queue on the current task.
///
/// Always sends exactly one [`WorkerEvent::Finished`] as its last event and
/// returns the same status.
pub async fn run_batch(
    files: &[PathBuf],
    config: &ConversionConfig,
    analyzer: &dyn LayoutAnalyzer,
    events: &EventSink,
    cancel: &CancelFlag,
) -> BatchStatus {
    let total_files = files.len();
    let mut saved = 0usize;
    let mut failed = 0usize;

    for (index, path) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            events.log("Conversion cancelled by user.");
            break;
        }

        let name = display_name(path);
        info!("Processing file {}/{}: {}", index + 1, total_files, path.display());
        events.send(WorkerEvent::FileStarted {
            index: index + 1,
            total: total_files,
            path: path.clone(),
        });
        events.log(format!("Processing File {}/{}: {}", index + 1, total_files, name));

        let ctx = FileContext {
            events,
            cancel,
            file_index: index,
            total_files,
        };

        match convert_and_save(path, analyzer, config, ctx).await {
            Ok(FileOutcome::Saved { path: out, .. }) => {
                saved += 1;
                events.log(format!("  - Saved to {}", out.display()));
                events.send(WorkerEvent::FileSaved { path: out });
            }
            Ok(FileOutcome::Cancelled) => {
                events.log("Processing stopped for this file.");
            }
            Err(e) if e.is_credential_error() => {
                error!("Credential rejected while processing {}: {}", path.display(), e);
                events.log("Error: User provided an invalid API Key.");
                return finish(events, BatchStatus::InvalidCredential(e.to_string()));
            }
            Err(e) => {
                failed += 1;
                warn!("Failed to convert {}: {}", path.display(), e);
                events.log(format!("Error processing {}: {}", name, e));
                events.send(WorkerEvent::FileFailed {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    if cancel.is_cancelled() {
        events.progress(0.0);
        finish(events, BatchStatus::Cancelled)
    } else {
        events.progress(100.0);
        finish(events, BatchStatus::Completed { saved, failed })
    }
}

fn finish(events: &EventSink, status: BatchStatus) -> BatchStatus {
    info!("Batch finished: {:?}", status);
    events.send(WorkerEvent::Finished(status.clone()));
    status
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A running batch on its own thread.
pub struct BatchHandle {
    /// Worker events; closes after [`WorkerEvent::Finished`].
    pub events: mpsc::UnboundedReceiver<WorkerEvent>,
    /// Set to stop the worker at the next file or page boundary.
    pub cancel: CancelFlag,
    join: JoinHandle<BatchStatus>,
}

impl BatchHandle {
    /// Wait for the worker thread and return its terminal status.
    pub fn join(self) -> BatchStatus {
        self.join
            .join()
            .unwrap_or_else(|_| BatchStatus::Failed("batch worker panicked".into()))
    }
}

/// Start a worker thread for `files`.
///
/// The thread owns a single-threaded tokio runtime. Setup failures (for
/// example no usable API key) are reported as [`BatchStatus::Failed`]
/// through the event channel rather than returned here.
pub fn spawn_batch(files: Vec<PathBuf>, config: ConversionConfig) -> Result<BatchHandle, Pdf2PptxError> {
    let (events, rx) = EventSink::channel();
    let cancel = CancelFlag::new();
    let worker_cancel = cancel.clone();

    let join = std::thread::Builder::new()
        .name("pdf2pptx-worker".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    return finish(&events, BatchStatus::Failed(format!("runtime: {e}")));
                }
            };
            runtime.block_on(async {
                let analyzer: Arc<dyn LayoutAnalyzer> = match resolve_analyzer(&config) {
                    Ok(a) => a,
                    Err(e) if e.is_credential_error() => {
                        return finish(&events, BatchStatus::InvalidCredential(e.to_string()));
                    }
                    Err(e) => return finish(&events, BatchStatus::Failed(e.to_string())),
                };
                run_batch(&files, &config, analyzer.as_ref(), &events, &worker_cancel).await
            })
        })
        .map_err(|e| Pdf2PptxError::Internal(format!("Failed to spawn worker thread: {e}")))?;

    Ok(BatchHandle {
        events: rx,
        cancel,
        join,
    })
}
