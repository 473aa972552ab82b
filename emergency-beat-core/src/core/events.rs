use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::error::{DownloadError, ErrorKind, Triage};
use crate::models::media::VideoMetadata;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionEvent {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub triage: Triage,
    pub status: Option<u16>,
    pub message: String,
}

impl From<&DownloadError> for ErrorEvent {
    fn from(err: &DownloadError) -> Self {
        Self {
            kind: err.kind(),
            triage: err.triage(),
            status: err.status(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum DownloadEvent {
    Progress(u8),
    Metadata(VideoMetadata),
    Completed(CompletionEvent),
    Failed(ErrorEvent),
}

impl DownloadEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadEvent::Completed(_) | DownloadEvent::Failed(_))
    }
}

/// Sink for pipeline events. Implementations must not block.
pub trait EventEmitter: Send + Sync + 'static {
    fn emit(&self, event: DownloadEvent);
}

#[derive(Clone)]
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<DownloadEvent>,
}

impl ChannelEmitter {
    pub fn new(tx: mpsc::UnboundedSender<DownloadEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DownloadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl EventEmitter for ChannelEmitter {
    fn emit(&self, event: DownloadEvent) {
        // receiver gone means nobody is listening anymore
        let _ = self.tx.send(event);
    }
}
