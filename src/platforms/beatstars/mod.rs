use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use emergency_beat_core::core::error::DownloadError;
use emergency_beat_core::models::media::{CanonicalIdentifier, ResolvedStream};
use emergency_beat_core::models::request::ServiceHint;
use emergency_beat_core::models::settings::DownloaderSettings;

use crate::core::container::Container;
use crate::core::direct_downloader;
use crate::core::http_client::{self, HeaderProfile, HttpClients};
use crate::core::redirect;
use crate::core::reporter::Reporter;
use crate::core::url_parser;
use crate::platforms::traits::AudioPipeline;

/// Progress once the stream endpoint redirect is resolved.
const RESOLVED_PERCENT: u8 = 30;

pub struct BeatstarsPipeline {
    clients: HttpClients,
    settings: Arc<DownloaderSettings>,
}

impl BeatstarsPipeline {
    pub fn new(settings: Arc<DownloaderSettings>) -> anyhow::Result<Self> {
        let clients = HttpClients::from_settings(&settings)?;
        Ok(Self { clients, settings })
    }

    pub fn stream_url(&self, id: &str) -> Result<String, DownloadError> {
        url::Url::parse_with_params(
            &self.settings.stream_endpoint,
            &[("id", id), ("return", "audio")],
        )
        .map(|u| u.to_string())
        .map_err(|e| {
            DownloadError::Resolution(format!(
                "invalid stream endpoint {}: {}",
                self.settings.stream_endpoint, e
            ))
        })
    }
}

#[async_trait]
impl AudioPipeline for BeatstarsPipeline {
    fn name(&self) -> &str {
        "beatstars"
    }

    fn service(&self) -> ServiceHint {
        ServiceHint::BeatMarketplace
    }

    fn normalize(&self, raw_input: &str) -> Result<CanonicalIdentifier, DownloadError> {
        let id = url_parser::normalize(raw_input, ServiceHint::BeatMarketplace)?;
        tracing::debug!("[beatstars] extracted id: {}", id);
        Ok(id)
    }

    async fn resolve(
        &self,
        id: &CanonicalIdentifier,
        reporter: &Reporter,
    ) -> Result<ResolvedStream, DownloadError> {
        let url = self.stream_url(id.as_str())?;
        let headers = http_client::browser_headers(
            HeaderProfile::Resolve,
            self.settings.user_agent.as_deref(),
        );

        tracing::debug!("[beatstars] requesting stream URL: {}", url);
        http_client::log_headers("beatstars", &headers);

        let target = redirect::resolve_redirect(self.clients.for_url(&url), &url, headers).await?;
        tracing::debug!("[beatstars] resolved URL: {}", target.final_url);

        reporter.progress(RESOLVED_PERCENT);

        Ok(ResolvedStream {
            final_url: target.final_url,
            expected_size_bytes: target.content_length,
            mime_hint: target.content_type,
            encoding_id: None,
            page_url: None,
            anonymous_client: false,
        })
    }

    async fn retrieve(
        &self,
        stream: &ResolvedStream,
        destination: &Path,
        reporter: &Reporter,
    ) -> Result<PathBuf, DownloadError> {
        let headers = http_client::browser_headers(
            HeaderProfile::Stream,
            self.settings.user_agent.as_deref(),
        );

        let transfer = direct_downloader::download_to_file(
            self.clients.for_url(&stream.final_url),
            &stream.final_url,
            headers,
            destination,
            self.settings.chunk_size,
            stream.expected_size_bytes,
            reporter,
        )
        .await?;

        tracing::debug!(
            "[beatstars] wrote {} bytes to {}",
            transfer.bytes_written,
            destination.display()
        );

        let sniffed = Container::sniff(&transfer.head);
        if sniffed != Container::Unknown && !sniffed.is_mp3() {
            tracing::warn!(
                "[beatstars] {} looks like {:?} data, not MP3",
                destination.display(),
                sniffed
            );
        } else if let Some(mime) = &stream.mime_hint {
            let declared = Container::from_mime(mime);
            if declared != Container::Unknown && !declared.is_mp3() {
                tracing::warn!("[beatstars] origin declared {} for an .mp3 output", mime);
            }
        }

        Ok(destination.to_path_buf())
    }
}
