//! Worker-to-UI messages and cooperative cancellation.
//!
//! The batch worker never touches the user interface. Everything it wants
//! to say goes through an [`EventSink`] as a [`WorkerEvent`]; the receiving
//! side (the CLI's progress bar, a GUI, a test) drains the channel on its
//! own thread. The other direction is a single [`CancelFlag`], set by the UI
//! and polled by the worker between pages.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2pptx::{CancelFlag, EventSink, WorkerEvent};
//!
//! let (sink, mut rx) = EventSink::channel();
//! let cancel = CancelFlag::new();
//!
//! sink.log("Starting");
//! cancel.cancel();
//! assert!(cancel.is_cancelled());
//! assert!(matches!(rx.try_recv(), Ok(WorkerEvent::Log(_))));
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One message from the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Free-form status line for the log view.
    Log(String),
    /// A new input file is being opened (1-based `index`).
    FileStarted {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    /// A page of the current file is being analysed (1-based `page`).
    PageStarted { page: usize, total: usize },
    /// Overall batch progress in percent, `0.0..=100.0`.
    Progress(f64),
    /// A presentation was written.
    FileSaved { path: PathBuf },
    /// A file failed; the batch moves on to the next one.
    FileFailed { path: PathBuf, error: String },
    /// Terminal message. Exactly one is sent per batch, and it is the last.
    Finished(BatchStatus),
}

/// How a batch ended.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchStatus {
    /// Every file was attempted.
    Completed { saved: usize, failed: usize },
    /// The user asked to stop. The file in progress was not saved.
    Cancelled,
    /// The inference service rejected the API key; the batch stopped at once.
    InvalidCredential(String),
    /// Setup failed before any file was attempted.
    Failed(String),
}

impl BatchStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchStatus::Completed { failed: 0, .. })
    }
}

/// Sending half of the worker's event channel.
///
/// Sends never block and never fail from the worker's point of view: if the
/// receiver is gone the event is dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<WorkerEvent>>,
}

impl EventSink {
    /// A connected sink and its receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything.
    pub fn noop() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, event: WorkerEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn log(&self, line: impl Into<String>) {
        self.send(WorkerEvent::Log(line.into()));
    }

    pub fn progress(&self, percent: f64) {
        self.send(WorkerEvent::Progress(percent.clamp(0.0, 100.0)));
    }
}

/// Shared stop request. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Batch progress after `pages_done` of `total_pages` pages of the
/// `file_index`-th (0-based) of `total_files` files.
///
/// Each file owns an equal share of the bar.
pub fn batch_percent(
    file_index: usize,
    total_files: usize,
    pages_done: usize,
    total_pages: usize,
) -> f64 {
    if total_files == 0 {
        return 0.0;
    }
    let file_share = 100.0 / total_files as f64;
    let within = if total_pages == 0 {
        0.0
    } else {
        pages_done.min(total_pages) as f64 / total_pages as f64
    };
    ((file_index as f64 + within) * file_share).clamp(0.0, 100.0)
}
