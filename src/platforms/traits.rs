use std::path::{Path, PathBuf};

use async_trait::async_trait;

use emergency_beat_core::core::error::DownloadError;
use emergency_beat_core::models::media::{CanonicalIdentifier, ResolvedStream};
use emergency_beat_core::models::request::ServiceHint;

use crate::core::reporter::Reporter;

/// One service backend. Stages run strictly in order: `normalize`, then
/// `resolve`, then `retrieve`. Each stage may report progress; terminal
/// events are left to the worker.
#[async_trait]
pub trait AudioPipeline: Send + Sync {
    fn name(&self) -> &str;
    fn service(&self) -> ServiceHint;

    fn normalize(&self, raw_input: &str) -> Result<CanonicalIdentifier, DownloadError>;

    async fn resolve(
        &self,
        id: &CanonicalIdentifier,
        reporter: &Reporter,
    ) -> Result<ResolvedStream, DownloadError>;

    /// Writes the stream to `destination` (a `.mp3` path) and returns the
    /// path actually written.
    async fn retrieve(
        &self,
        stream: &ResolvedStream,
        destination: &Path,
        reporter: &Reporter,
    ) -> Result<PathBuf, DownloadError>;
}
