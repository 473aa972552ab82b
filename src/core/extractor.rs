use std::path::{Path, PathBuf};

use anyhow::anyhow;
use async_trait::async_trait;

/// How the extractor authenticates against the video site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    Standard,
    /// Non-interactive mode: no cookies, alternate player client.
    Anonymous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamFormat {
    pub itag: u32,
    pub mime_type: String,
    pub extension: String,
    pub abr_kbps: Option<f64>,
    pub height: Option<u32>,
    pub has_audio: bool,
    pub has_video: bool,
    pub filesize: Option<u64>,
    pub url: Option<String>,
}

impl StreamFormat {
    pub fn is_audio_only(&self) -> bool {
        self.has_audio && !self.has_video
    }

    pub fn is_progressive(&self) -> bool {
        self.has_audio && self.has_video
    }
}

/// Query view over the formats a session offers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSet {
    formats: Vec<StreamFormat>,
}

impl StreamSet {
    pub fn new(formats: Vec<StreamFormat>) -> Self {
        Self { formats }
    }

    pub fn get_by_itag(&self, itag: u32) -> Option<&StreamFormat> {
        self.formats.iter().find(|f| f.itag == itag)
    }

    pub fn audio_only_by_bitrate(&self) -> Vec<&StreamFormat> {
        let mut audio: Vec<&StreamFormat> =
            self.formats.iter().filter(|f| f.is_audio_only()).collect();
        audio.sort_by(|a, b| {
            b.abr_kbps
                .unwrap_or(0.0)
                .total_cmp(&a.abr_kbps.unwrap_or(0.0))
        });
        audio
    }

    pub fn progressive_by_resolution(&self) -> Vec<&StreamFormat> {
        let mut progressive: Vec<&StreamFormat> =
            self.formats.iter().filter(|f| f.is_progressive()).collect();
        progressive.sort_by(|a, b| b.height.unwrap_or(0).cmp(&a.height.unwrap_or(0)));
        progressive
    }
}

/// An opened video page: details plus whatever the stream listing produced.
#[derive(Debug, Clone)]
pub struct VideoSession {
    pub video_id: String,
    pub page_url: String,
    pub mode: ClientMode,
    pub title: String,
    pub author: String,
    pub length_seconds: u64,
    pub views: u64,
    pub thumbnail_url: Option<String>,
    streams: Result<StreamSet, String>,
}

impl VideoSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        video_id: impl Into<String>,
        page_url: impl Into<String>,
        mode: ClientMode,
        title: impl Into<String>,
        author: impl Into<String>,
        length_seconds: u64,
        views: u64,
        thumbnail_url: Option<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            page_url: page_url.into(),
            mode,
            title: title.into(),
            author: author.into(),
            length_seconds,
            views,
            thumbnail_url,
            streams: Ok(StreamSet::default()),
        }
    }

    pub fn with_streams(mut self, streams: Result<StreamSet, String>) -> Self {
        self.streams = streams;
        self
    }

    pub fn streams(&self) -> anyhow::Result<&StreamSet> {
        self.streams
            .as_ref()
            .map_err(|e| anyhow!("stream listing failed: {}", e))
    }
}

/// What the extractor knows about a transfer in flight: the stream's full
/// size, the bytes that just arrived and how many are still missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTick {
    pub filesize: u64,
    pub chunk_len: u64,
    pub bytes_remaining: u64,
}

pub type ProgressCallback<'a> = &'a (dyn Fn(ProgressTick) + Send + Sync);

#[derive(Debug, Clone)]
pub struct ExtractorDownload<'a> {
    pub page_url: &'a str,
    pub mode: ClientMode,
    pub itag: u32,
    pub output_dir: &'a Path,
    pub file_stem: &'a str,
}

/// Capabilities the YouTube pipeline needs from a video-info extractor.
#[async_trait]
pub trait VideoExtractor: Send + Sync {
    fn name(&self) -> &str;

    async fn open_session(&self, page_url: &str, mode: ClientMode) -> anyhow::Result<VideoSession>;

    /// Re-reads the format table of an already opened session.
    async fn list_streams(&self, session: &VideoSession) -> anyhow::Result<StreamSet>;

    /// Downloads one stream and returns the path written, whose extension
    /// matches the negotiated container.
    async fn download(
        &self,
        request: ExtractorDownload<'_>,
        on_progress: ProgressCallback<'_>,
    ) -> anyhow::Result<PathBuf>;
}
