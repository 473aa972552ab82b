use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use emergency_beat_core::core::error::DownloadError;
use emergency_beat_core::models::media::{
    AudioEncoding, CanonicalIdentifier, ResolvedStream, VideoMetadata,
};
use emergency_beat_core::models::request::ServiceHint;
use emergency_beat_core::models::settings::DownloaderSettings;

use crate::core::container::Container;
use crate::core::extractor::{
    ClientMode, ExtractorDownload, ProgressTick, StreamFormat, StreamSet, VideoExtractor,
    VideoSession,
};
use crate::core::ffmpeg;
use crate::core::reporter::Reporter;
use crate::core::url_parser;
use crate::platforms::traits::AudioPipeline;

/// Progress right after metadata went out.
const METADATA_PERCENT: u8 = 20;

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

pub fn embed_url(video_id: &str) -> String {
    format!("https://www.youtube.com/embed/{}", video_id)
}

/// Session strategies, tried in order until one opens.
pub fn init_ladder(video_id: &str) -> [(String, ClientMode); 3] {
    [
        (watch_url(video_id), ClientMode::Standard),
        (watch_url(video_id), ClientMode::Anonymous),
        (embed_url(video_id), ClientMode::Standard),
    ]
}

/// `floor((size - remaining) / size * 90) + 10`.
pub fn extractor_progress(tick: ProgressTick) -> Option<u8> {
    if tick.filesize == 0 {
        return None;
    }
    let size = u128::from(tick.filesize);
    let done = size - u128::from(tick.bytes_remaining).min(size);
    Some((10 + (90 * done) / size) as u8)
}

/// Picks the stream to download: a known audio itag first (in preference
/// order), then the best audio-only stream, then the best progressive one.
pub fn select_stream<'a>(streams: &'a StreamSet, preferred_itags: &[u32]) -> Option<&'a StreamFormat> {
    preferred_itags
        .iter()
        .find_map(|itag| streams.get_by_itag(*itag))
        .or_else(|| streams.audio_only_by_bitrate().into_iter().next())
        .or_else(|| streams.progressive_by_resolution().into_iter().next())
}

fn audio_encodings(streams: &StreamSet) -> Vec<AudioEncoding> {
    streams
        .audio_only_by_bitrate()
        .into_iter()
        .map(|f| AudioEncoding {
            encoding_id: f.itag,
            average_bitrate_kbps: f.abr_kbps,
            mime_type: f.mime_type.clone(),
        })
        .collect()
}

fn metadata_for(session: &VideoSession, streams: Option<&StreamSet>) -> VideoMetadata {
    VideoMetadata {
        title: session.title.clone(),
        author: session.author.clone(),
        duration_seconds: session.length_seconds,
        view_count: session.views,
        thumbnail_url: session.thumbnail_url.clone(),
        available_audio_encodings: streams.map(audio_encodings).unwrap_or_default(),
    }
}

pub struct YouTubePipeline {
    extractor: Arc<dyn VideoExtractor>,
    settings: Arc<DownloaderSettings>,
}

impl YouTubePipeline {
    pub fn new(extractor: Arc<dyn VideoExtractor>, settings: Arc<DownloaderSettings>) -> Self {
        Self {
            extractor,
            settings,
        }
    }

    async fn open_session(&self, video_id: &str) -> Result<VideoSession, DownloadError> {
        let mut last_error = None;

        for (attempt, (page_url, mode)) in init_ladder(video_id).into_iter().enumerate() {
            match self.extractor.open_session(&page_url, mode).await {
                Ok(session) => {
                    tracing::debug!(
                        "[youtube] session opened via {} ({:?}) on attempt {}",
                        page_url,
                        mode,
                        attempt + 1
                    );
                    return Ok(session);
                }
                Err(e) => {
                    tracing::warn!(
                        "[youtube] {} init failed for {} ({:?}): {:#}",
                        self.extractor.name(),
                        page_url,
                        mode,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        let message = last_error
            .map(|e| format!("{:#}", e))
            .unwrap_or_else(|| "no initialization strategy available".to_string());
        Err(DownloadError::Resolution(message))
    }

    /// Best-effort stream listing. An empty audio list triggers one fresh
    /// listing from the extractor; failures only get logged.
    async fn load_streams(&self, session: &VideoSession) -> Option<StreamSet> {
        let listed = match session.streams() {
            Ok(set) => Some(set.clone()),
            Err(e) => {
                tracing::warn!("[youtube] {:#}", e);
                None
            }
        };

        if let Some(set) = &listed {
            if !set.audio_only_by_bitrate().is_empty() {
                return listed;
            }
        }

        tracing::debug!("[youtube] no audio-only streams listed, refreshing");
        match self.extractor.list_streams(session).await {
            Ok(set) => Some(set),
            Err(e) => {
                tracing::warn!("[youtube] stream refresh failed: {:#}", e);
                listed
            }
        }
    }

    async fn finalize_mp3(
        &self,
        downloaded: PathBuf,
        destination: &Path,
    ) -> Result<PathBuf, DownloadError> {
        let mut container = Container::from_path(&downloaded);
        if container == Container::Unknown {
            container = sniff_file(&downloaded).await;
        }

        if container.is_mp3() {
            if downloaded.as_path() != destination {
                tokio::fs::rename(&downloaded, destination).await?;
            }
            return Ok(destination.to_path_buf());
        }

        if self.settings.transcode_to_mp3 && ffmpeg::is_ffmpeg_available().await {
            tracing::debug!(
                "[youtube] transcoding {:?} stream to {}",
                container,
                destination.display()
            );
            match ffmpeg::transcode_to_mp3(&downloaded, destination).await {
                Ok(()) => {
                    remove_quietly(&downloaded).await;
                    return Ok(destination.to_path_buf());
                }
                Err(e) => {
                    tracing::warn!("[youtube] transcode failed: {:#}", e);
                    remove_quietly(destination).await;
                }
            }
        }

        let ext = match container {
            Container::Unknown => downloaded
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or(container.extension())
                .to_string(),
            known => known.extension().to_string(),
        };
        let kept = destination.with_extension(ext);
        if downloaded != kept {
            tokio::fs::rename(&downloaded, &kept).await?;
        }
        tracing::warn!(
            "[youtube] stream is {:?}, not MP3; kept as {}",
            container,
            kept.display()
        );
        Ok(kept)
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!("[youtube] could not remove {}: {}", path.display(), e);
    }
}

async fn sniff_file(path: &Path) -> Container {
    use tokio::io::AsyncReadExt;

    let mut head = [0u8; 16];
    let Ok(mut file) = tokio::fs::File::open(path).await else {
        return Container::Unknown;
    };
    match file.read(&mut head).await {
        Ok(n) => Container::sniff(&head[..n]),
        Err(_) => Container::Unknown,
    }
}

#[async_trait]
impl AudioPipeline for YouTubePipeline {
    fn name(&self) -> &str {
        "youtube"
    }

    fn service(&self) -> ServiceHint {
        ServiceHint::YouTube
    }

    fn normalize(&self, raw_input: &str) -> Result<CanonicalIdentifier, DownloadError> {
        let id = url_parser::normalize(raw_input, ServiceHint::YouTube)?;
        tracing::debug!("[youtube] extracted id: {}", id);
        Ok(id)
    }

    async fn resolve(
        &self,
        id: &CanonicalIdentifier,
        reporter: &Reporter,
    ) -> Result<ResolvedStream, DownloadError> {
        let session = self.open_session(id.as_str()).await?;
        let streams = self.load_streams(&session).await;

        reporter.metadata(metadata_for(&session, streams.as_ref()));
        reporter.progress(METADATA_PERCENT);

        let chosen = streams
            .as_ref()
            .and_then(|set| select_stream(set, &self.settings.audio_itags))
            .ok_or_else(|| DownloadError::Resolution("no suitable stream".to_string()))?;

        tracing::debug!(
            "[youtube] selected itag {} ({}, {:?} kbps)",
            chosen.itag,
            chosen.mime_type,
            chosen.abr_kbps
        );

        Ok(ResolvedStream {
            final_url: chosen.url.clone().unwrap_or_else(|| session.page_url.clone()),
            expected_size_bytes: chosen.filesize,
            mime_hint: Some(chosen.mime_type.clone()),
            encoding_id: Some(chosen.itag),
            page_url: Some(session.page_url.clone()),
            anonymous_client: session.mode == ClientMode::Anonymous,
        })
    }

    async fn retrieve(
        &self,
        stream: &ResolvedStream,
        destination: &Path,
        reporter: &Reporter,
    ) -> Result<PathBuf, DownloadError> {
        let itag = stream
            .encoding_id
            .ok_or_else(|| DownloadError::Unexpected("stream has no encoding id".to_string()))?;
        let page_url = stream.page_url.as_deref().unwrap_or(&stream.final_url);
        let output_dir = destination.parent().unwrap_or_else(|| Path::new("."));
        let file_stem = destination
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| DownloadError::Retrieval("invalid output filename".to_string()))?;
        let mode = if stream.anonymous_client {
            ClientMode::Anonymous
        } else {
            ClientMode::Standard
        };

        let on_progress = |tick: ProgressTick| {
            if let Some(pct) = extractor_progress(tick) {
                reporter.progress(pct);
            }
        };

        let downloaded = self
            .extractor
            .download(
                ExtractorDownload {
                    page_url,
                    mode,
                    itag,
                    output_dir,
                    file_stem,
                },
                &on_progress,
            )
            .await
            .map_err(|e| DownloadError::Retrieval(format!("{:#}", e)))?;

        tracing::debug!("[youtube] extractor wrote {}", downloaded.display());
        self.finalize_mp3(downloaded, destination).await
    }
}
