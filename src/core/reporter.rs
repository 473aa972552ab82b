use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use emergency_beat_core::core::error::DownloadError;
use emergency_beat_core::core::events::{
    CompletionEvent, DownloadEvent, ErrorEvent, EventEmitter,
};
use emergency_beat_core::models::media::VideoMetadata;

/// One-shot event channel for a single download.
///
/// Progress never goes backwards and never repeats. Exactly one terminal
/// event is emitted; anything after it is dropped. Completion is always
/// preceded by `Progress(100)`.
pub struct Reporter {
    emitter: Arc<dyn EventEmitter>,
    // last emitted percent + 1, 0 while nothing was emitted
    last: AtomicU16,
    finished: AtomicBool,
}

impl Reporter {
    pub fn new(emitter: Arc<dyn EventEmitter>) -> Self {
        Self {
            emitter,
            last: AtomicU16::new(0),
            finished: AtomicBool::new(false),
        }
    }

    pub fn progress(&self, percent: u8) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        let percent = percent.min(100);
        let encoded = u16::from(percent) + 1;
        let previous = self.last.fetch_max(encoded, Ordering::SeqCst);
        if encoded > previous {
            self.emitter.emit(DownloadEvent::Progress(percent));
        }
    }

    pub fn metadata(&self, metadata: VideoMetadata) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        self.emitter.emit(DownloadEvent::Metadata(metadata));
    }

    pub fn complete(&self, path: PathBuf) {
        self.progress(100);
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        self.emitter
            .emit(DownloadEvent::Completed(CompletionEvent { path }));
    }

    pub fn fail(&self, err: &DownloadError) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::error!("download failed: {}", err);
        self.emitter.emit(DownloadEvent::Failed(ErrorEvent::from(err)));
    }
}
