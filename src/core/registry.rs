use std::sync::Arc;

use emergency_beat_core::models::request::ServiceHint;
use emergency_beat_core::models::settings::DownloaderSettings;

use crate::core::ytdlp::YtDlpExtractor;
use crate::platforms::beatstars::BeatstarsPipeline;
use crate::platforms::traits::AudioPipeline;
use crate::platforms::youtube::YouTubePipeline;

pub struct PipelineRegistry {
    pipelines: Vec<Arc<dyn AudioPipeline>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self {
            pipelines: Vec::new(),
        }
    }

    pub fn register(&mut self, pipeline: Arc<dyn AudioPipeline>) {
        self.pipelines.push(pipeline);
    }

    pub fn find(&self, service: ServiceHint) -> Option<Arc<dyn AudioPipeline>> {
        self.pipelines
            .iter()
            .find(|p| p.service() == service)
            .cloned()
    }
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Both backends, the YouTube one driven by yt-dlp.
pub fn default_registry(settings: Arc<DownloaderSettings>) -> anyhow::Result<PipelineRegistry> {
    let mut registry = PipelineRegistry::new();
    registry.register(Arc::new(BeatstarsPipeline::new(settings.clone())?));
    registry.register(Arc::new(YouTubePipeline::new(
        Arc::new(YtDlpExtractor::from_settings(&settings)),
        settings,
    )));
    Ok(registry)
}
