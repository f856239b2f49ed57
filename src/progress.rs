// Progress events and the channel they travel on
//
// Workers never touch presentation state directly: every observable change
// is an event pushed through a ProgressSink. The receiver side lives on the
// control thread, which renders the events however it likes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::models::EncodeStats;

/// Which transfer a download event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DownloadPhase {
    Video,
    Audio,
}

impl DownloadPhase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Video => "downloading video",
            Self::Audio => "downloading audio",
        }
    }
}

/// One observable step of a running job.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Inspecting {
        url: String,
    },
    Selected {
        resolution: Option<u32>,
        needs_merge: bool,
    },
    Download {
        phase: DownloadPhase,
        percent: f32,
        received: u64,
        total: Option<u64>,
    },
    EncodeStageStarted {
        backend: String,
    },
    Encoding {
        percent: f32,
        avg_fps: f32,
        frame: u64,
    },
    EncodeStageFailed {
        backend: String,
        detail: String,
    },
    Completed {
        path: PathBuf,
        stats: Option<EncodeStats>,
    },
}

/// Sending half of the progress channel. Cloneable, cheap, safe to hand to
/// worker tasks and blocking threads alike.
#[derive(Clone)]
pub struct ProgressSink {
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    /// Sink plus the receiver the control thread drains.
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Sink that drops every event. Useful in tests.
    pub fn discard() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            // A closed receiver just means nobody is watching anymore.
            let _ = tx.send(event);
        }
    }
}

/// Cooperative cancellation flag threaded through download and encode
/// loops. The current UI has no cancel affordance; the token exists so one
/// can be added without reworking the workers.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
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
