use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use futures::FutureExt;

use emergency_beat_core::core::error::DownloadError;
use emergency_beat_core::core::events::EventEmitter;
use emergency_beat_core::fs_paths;
use emergency_beat_core::models::request::DownloadRequest;
use emergency_beat_core::models::settings::DownloaderSettings;

use crate::core::registry;
use crate::core::reporter::Reporter;
use crate::platforms::traits::AudioPipeline;

/// Progress once the input was accepted.
pub const STARTED_PERCENT: u8 = 10;

/// Normalize, resolve, retrieve. Returns the absolute path written.
pub async fn run_pipeline(
    pipeline: &dyn AudioPipeline,
    request: &DownloadRequest,
    settings: &DownloaderSettings,
    reporter: &Reporter,
) -> Result<PathBuf, DownloadError> {
    let id = pipeline.normalize(request.raw_input())?;
    reporter.progress(STARTED_PERCENT);

    let filename =
        fs_paths::output_filename(request.desired_filename(), &settings.default_filename);
    let destination = fs_paths::destination_path(
        request.destination_dir(),
        &settings.default_output_dir,
        &filename,
    );
    tracing::debug!(
        "[{}] output file: {}",
        pipeline.name(),
        destination.display()
    );

    let stream = pipeline.resolve(&id, reporter).await?;
    let written = pipeline.retrieve(&stream, &destination, reporter).await?;

    Ok(std::path::absolute(&written).unwrap_or(written))
}

/// Runs the pipeline to its single terminal event. Panics inside the
/// pipeline end up as an `Unexpected` failure.
pub async fn execute(
    pipeline: &dyn AudioPipeline,
    request: &DownloadRequest,
    settings: &DownloaderSettings,
    reporter: &Reporter,
) {
    let outcome = AssertUnwindSafe(run_pipeline(pipeline, request, settings, reporter))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(path)) => {
            tracing::info!("[{}] saved {}", pipeline.name(), path.display());
            reporter.complete(path);
        }
        Ok(Err(e)) => reporter.fail(&e),
        Err(panic) => reporter.fail(&DownloadError::Unexpected(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

pub struct DownloadHandle {
    thread: JoinHandle<()>,
}

impl DownloadHandle {
    pub fn thread_name(&self) -> Option<&str> {
        self.thread.thread().name()
    }

    /// Blocks until the worker emitted its terminal event and exited.
    pub fn join(self) -> std::thread::Result<()> {
        self.thread.join()
    }
}

/// Starts `request` on its own thread, picking the pipeline for the
/// request's service from the default registry.
pub fn spawn_download(
    request: DownloadRequest,
    settings: Arc<DownloaderSettings>,
    emitter: Arc<dyn EventEmitter>,
) -> std::io::Result<DownloadHandle> {
    let service = request.service_hint();
    let pipeline_settings = settings.clone();
    spawn_worker(request, settings, emitter, move || {
        let registry = registry::default_registry(pipeline_settings)
            .map_err(|e| DownloadError::Unexpected(format!("{:#}", e)))?;
        registry.find(service).ok_or_else(|| {
            DownloadError::Unexpected(format!("no pipeline registered for {}", service))
        })
    })
}

pub fn spawn_with_pipeline(
    pipeline: Arc<dyn AudioPipeline>,
    request: DownloadRequest,
    settings: Arc<DownloaderSettings>,
    emitter: Arc<dyn EventEmitter>,
) -> std::io::Result<DownloadHandle> {
    spawn_worker(request, settings, emitter, move || Ok(pipeline))
}

fn spawn_worker<F>(
    request: DownloadRequest,
    settings: Arc<DownloaderSettings>,
    emitter: Arc<dyn EventEmitter>,
    make_pipeline: F,
) -> std::io::Result<DownloadHandle>
where
    F: FnOnce() -> Result<Arc<dyn AudioPipeline>, DownloadError> + Send + 'static,
{
    let name = format!("download-{}", request.service_hint());
    let thread = std::thread::Builder::new().name(name).spawn(move || {
        let reporter = Reporter::new(emitter);

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                reporter.fail(&DownloadError::Unexpected(format!(
                    "failed to start runtime: {}",
                    e
                )));
                return;
            }
        };

        let pipeline = match make_pipeline() {
            Ok(p) => p,
            Err(e) => {
                reporter.fail(&e);
                return;
            }
        };

        runtime.block_on(execute(pipeline.as_ref(), &request, &settings, &reporter));
    })?;

    Ok(DownloadHandle { thread })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::direct_downloader::tests::serve;
    use crate::core::extractor::VideoExtractor;
    use crate::platforms::beatstars::BeatstarsPipeline;
    use crate::platforms::youtube::tests::{audio_set, FakeExtractor};
    use crate::platforms::youtube::YouTubePipeline;
    use async_trait::async_trait;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::response::Redirect;
    use axum::routing::get;
    use axum::Router;
    use emergency_beat_core::core::error::{ErrorKind, Triage};
    use emergency_beat_core::core::events::{ChannelEmitter, DownloadEvent};
    use emergency_beat_core::models::media::{CanonicalIdentifier, ResolvedStream};
    use emergency_beat_core::models::request::{ServiceHint, StartCommand};
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    async fn collect(
        mut rx: tokio::sync::mpsc::UnboundedReceiver<DownloadEvent>,
    ) -> Vec<DownloadEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = event.is_terminal();
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    fn progress(events: &[DownloadEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                DownloadEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    struct Marketplace {
        base: String,
        stream_hits: Arc<AtomicUsize>,
        queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    }

    /// The audio route answers the resolve request normally; the retrieval
    /// request after it gets `retrieval_status`.
    async fn marketplace(retrieval_status: StatusCode) -> Marketplace {
        let stream_hits = Arc::new(AtomicUsize::new(0));
        let audio_hits = Arc::new(AtomicUsize::new(0));
        let queries: Arc<Mutex<Vec<HashMap<String, String>>>> = Arc::default();
        let (hits_in, queries_in) = (stream_hits.clone(), queries.clone());

        let app = Router::new()
            .route(
                "/stream",
                get(move |Query(q): Query<HashMap<String, String>>| {
                    hits_in.fetch_add(1, Ordering::SeqCst);
                    queries_in.lock().unwrap().push(q);
                    async { Redirect::temporary("/files/audio.mp3") }
                }),
            )
            .route(
                "/files/audio.mp3",
                get(move || {
                    let first = audio_hits.fetch_add(1, Ordering::SeqCst) == 0;
                    async move {
                        if first || retrieval_status == StatusCode::OK {
                            (StatusCode::OK, vec![0xFFu8; 2048])
                        } else {
                            (retrieval_status, b"Access Denied".to_vec())
                        }
                    }
                }),
            );
        Marketplace {
            base: serve(app).await,
            stream_hits,
            queries,
        }
    }

    fn marketplace_settings(base: &str) -> Arc<DownloaderSettings> {
        Arc::new(DownloaderSettings {
            stream_endpoint: format!("{}/stream", base),
            ..DownloaderSettings::default()
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn marketplace_download_end_to_end() {
        let server = marketplace(StatusCode::OK).await;
        let settings = marketplace_settings(&server.base);
        let dir = tempfile::tempdir().unwrap();

        let request = DownloadRequest::new(
            ServiceHint::BeatMarketplace,
            StartCommand::new("123456789")
                .with_filename("mysong")
                .with_destination(dir.path()),
        );
        let pipeline = Arc::new(BeatstarsPipeline::new(settings.clone()).unwrap());
        let (emitter, rx) = ChannelEmitter::channel();

        let handle =
            spawn_with_pipeline(pipeline, request, settings, Arc::new(emitter)).unwrap();
        let events = collect(rx).await;
        handle.join().unwrap();

        assert_eq!(progress(&events), vec![10, 30, 50, 85, 100]);
        match events.last().unwrap() {
            DownloadEvent::Completed(c) => {
                assert!(c.path.is_absolute());
                assert!(c.path.ends_with("mysong.mp3"));
                assert_eq!(std::fs::read(&c.path).unwrap().len(), 2048);
            }
            other => panic!("expected completion, got {:?}", other),
        }

        let queries = server.queries.lock().unwrap();
        assert_eq!(queries[0].get("id").map(String::as_str), Some("123456789"));
        assert_eq!(queries[0].get("return").map(String::as_str), Some("audio"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn forbidden_retrieval_emits_one_error_and_no_file() {
        let server = marketplace(StatusCode::FORBIDDEN).await;
        let settings = marketplace_settings(&server.base);
        let dir = tempfile::tempdir().unwrap();

        let request = DownloadRequest::new(
            ServiceHint::BeatMarketplace,
            StartCommand::new("123456789").with_destination(dir.path()),
        );
        let pipeline = Arc::new(BeatstarsPipeline::new(settings.clone()).unwrap());
        let (emitter, rx) = ChannelEmitter::channel();

        let handle =
            spawn_with_pipeline(pipeline, request, settings, Arc::new(emitter)).unwrap();
        let events = collect(rx).await;
        handle.join().unwrap();

        let failures: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                DownloadEvent::Failed(f) => Some(f.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, ErrorKind::Retrieval);
        assert_eq!(failures[0].status, Some(403));
        assert!(failures[0].message.contains("403"));
        assert_eq!(failures[0].triage, Triage::ProtectedContent);
        assert!(!dir.path().join("beat.mp3").exists());
        assert!(!dir.path().join("beat.mp3.part").exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blank_input_fails_before_any_request() {
        let server = marketplace(StatusCode::OK).await;
        let settings = marketplace_settings(&server.base);

        let request =
            DownloadRequest::new(ServiceHint::BeatMarketplace, StartCommand::new("   "));
        let pipeline = Arc::new(BeatstarsPipeline::new(settings.clone()).unwrap());
        let (emitter, rx) = ChannelEmitter::channel();

        let handle =
            spawn_with_pipeline(pipeline, request, settings, Arc::new(emitter)).unwrap();
        let events = collect(rx).await;
        handle.join().unwrap();

        assert_eq!(events.len(), 1);
        match &events[0] {
            DownloadEvent::Failed(f) => {
                assert_eq!(f.kind, ErrorKind::Normalization);
                assert_eq!(f.message, "empty input");
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(server.stream_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn youtube_metadata_arrives_once_before_completion() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(DownloaderSettings {
            transcode_to_mp3: false,
            ..DownloaderSettings::default()
        });
        let extractor: Arc<dyn VideoExtractor> = Arc::new(FakeExtractor::new(Ok(audio_set())));
        let pipeline = Arc::new(YouTubePipeline::new(extractor, settings.clone()));

        let request = DownloadRequest::new(
            ServiceHint::YouTube,
            StartCommand::new("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
                .with_destination(dir.path()),
        );
        let (emitter, rx) = ChannelEmitter::channel();

        let handle =
            spawn_with_pipeline(pipeline, request, settings, Arc::new(emitter)).unwrap();
        let events = collect(rx).await;
        handle.join().unwrap();

        let metadata_at: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, DownloadEvent::Metadata(_)))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(metadata_at.len(), 1);
        assert!(metadata_at[0] < events.len() - 1);
        assert_eq!(progress(&events), vec![10, 20, 32, 55, 77, 100]);
        match events.last().unwrap() {
            DownloadEvent::Completed(c) => assert!(c.path.ends_with("beat.mp3")),
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn youtube_download_through_ytdlp_reports_extractor_progress() {
        use crate::core::ytdlp::tests::stub_ytdlp;

        let bin_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let info = bin_dir.path().join("info.json");
        std::fs::write(
            &info,
            serde_json::to_vec(&serde_json::json!({
                "id": "dQw4w9WgXcQ",
                "title": "Never Gonna Give You Up",
                "uploader": "Rick Astley",
                "duration": 212.0,
                "view_count": 1000,
                "formats": [
                    {"format_id": "251", "ext": "webm", "vcodec": "none", "acodec": "opus",
                     "abr": 130.5, "filesize": 1000}
                ]
            }))
            .unwrap(),
        )
        .unwrap();
        let file = out_dir.path().join("mysong.webm");
        let stub = stub_ytdlp(
            bin_dir.path(),
            &format!(
                "case \" $* \" in *\" --dump-json \"*) cat '{info}'; exit 0 ;; esac\n\
                 echo '[beat-progress] 250/1000' >&2\n\
                 echo '[beat-progress] 500/1000' >&2\n\
                 echo '[beat-progress] 1000/1000' >&2\n\
                 printf 'x' > '{file}'\n\
                 echo '{file}'",
                info = info.display(),
                file = file.display()
            ),
        );

        let settings = Arc::new(DownloaderSettings {
            ytdlp_path: Some(stub),
            transcode_to_mp3: false,
            ..DownloaderSettings::default()
        });
        let request = DownloadRequest::new(
            ServiceHint::YouTube,
            StartCommand::new("https://youtu.be/dQw4w9WgXcQ")
                .with_filename("mysong")
                .with_destination(out_dir.path()),
        );
        let (emitter, rx) = ChannelEmitter::channel();

        let handle = spawn_download(request, settings, Arc::new(emitter)).unwrap();
        let events = collect(rx).await;
        handle.join().unwrap();

        assert_eq!(progress(&events), vec![10, 20, 32, 55, 100]);
        match events.last().unwrap() {
            DownloadEvent::Completed(c) => assert_eq!(c.path, file),
            other => panic!("expected completion, got {:?}", other),
        }
    }

    struct PanickingPipeline;

    #[async_trait]
    impl AudioPipeline for PanickingPipeline {
        fn name(&self) -> &str {
            "panicking"
        }

        fn service(&self) -> ServiceHint {
            ServiceHint::BeatMarketplace
        }

        fn normalize(&self, raw_input: &str) -> Result<CanonicalIdentifier, DownloadError> {
            Ok(CanonicalIdentifier::new(ServiceHint::BeatMarketplace, raw_input))
        }

        async fn resolve(
            &self,
            _id: &CanonicalIdentifier,
            _reporter: &Reporter,
        ) -> Result<ResolvedStream, DownloadError> {
            panic!("resolver blew up")
        }

        async fn retrieve(
            &self,
            _stream: &ResolvedStream,
            destination: &Path,
            _reporter: &Reporter,
        ) -> Result<PathBuf, DownloadError> {
            Ok(destination.to_path_buf())
        }
    }

    #[tokio::test]
    async fn panic_becomes_unexpected_error() {
        let request =
            DownloadRequest::new(ServiceHint::BeatMarketplace, StartCommand::new("1"));
        let (emitter, rx) = ChannelEmitter::channel();

        let handle = spawn_with_pipeline(
            Arc::new(PanickingPipeline),
            request,
            Arc::new(DownloaderSettings::default()),
            Arc::new(emitter),
        )
        .unwrap();
        let events = collect(rx).await;
        handle.join().unwrap();

        match events.last().unwrap() {
            DownloadEvent::Failed(f) => {
                assert_eq!(f.kind, ErrorKind::Unexpected);
                assert!(f.message.contains("resolver blew up"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn worker_thread_is_named_after_service() {
        let request =
            DownloadRequest::new(ServiceHint::BeatMarketplace, StartCommand::new(""));
        let (emitter, _rx) = ChannelEmitter::channel();
        let handle = spawn_download(
            request,
            Arc::new(DownloaderSettings::default()),
            Arc::new(emitter),
        )
        .unwrap();
        assert_eq!(handle.thread_name(), Some("download-beatstars"));
        handle.join().unwrap();
    }
}
