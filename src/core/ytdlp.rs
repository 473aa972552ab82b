use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::OnceCell;

use emergency_beat_core::fs_paths::{AppPaths, DesktopPaths};
use emergency_beat_core::models::settings::DownloaderSettings;

use crate::core::extractor::{
    ClientMode, ExtractorDownload, ProgressCallback, ProgressTick, StreamFormat, StreamSet,
    VideoExtractor, VideoSession,
};
use crate::core::http_client::EXTRACTOR_USER_AGENT;
use crate::core::process;

/// yt-dlp strips the leading `download:` type selector, so the printed line
/// starts at the marker.
const PROGRESS_MARKER: &str = "[beat-progress]";
const PROGRESS_TEMPLATE: &str = "download:[beat-progress] %(progress.downloaded_bytes)s/%(progress.total_bytes,progress.total_bytes_estimate)s";
const STDERR_TAIL_LINES: usize = 20;

fn bin_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

pub async fn find_ytdlp() -> Option<PathBuf> {
    if let Ok(status) = process::command(bin_name())
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        if status.success() {
            return Some(PathBuf::from(bin_name()));
        }
    }

    let managed = managed_ytdlp_path()?;
    if managed.exists() {
        return Some(managed);
    }

    None
}

fn managed_ytdlp_path() -> Option<PathBuf> {
    Some(DesktopPaths.bin_dir()?.join(bin_name()))
}

pub async fn ensure_ytdlp() -> anyhow::Result<PathBuf> {
    if let Some(path) = find_ytdlp().await {
        return Ok(path);
    }

    download_ytdlp_binary().await
}

async fn download_ytdlp_binary() -> anyhow::Result<PathBuf> {
    let target =
        managed_ytdlp_path().ok_or_else(|| anyhow!("could not determine data directory"))?;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let download_url = if cfg!(target_os = "windows") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe"
    } else if cfg!(target_os = "macos") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_macos"
    } else {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp"
    };

    tracing::info!("[ytdlp] fetching extractor from {}", download_url);
    let response = reqwest::get(download_url).await?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "failed to download yt-dlp: HTTP {}",
            response.status()
        ));
    }

    let bytes = response.bytes().await?;
    tokio::fs::write(&target, &bytes).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o755);
        tokio::fs::set_permissions(&target, perms).await?;
    }

    Ok(target)
}

/// yt-dlp driven through its CLI. Request headers, proxy and TLS handling
/// are configured per instance and passed on every invocation.
pub struct YtDlpExtractor {
    override_path: Option<PathBuf>,
    binary: OnceCell<PathBuf>,
    user_agent: String,
    proxy: Option<String>,
    skip_tls_verify: bool,
}

impl YtDlpExtractor {
    pub fn from_settings(settings: &DownloaderSettings) -> Self {
        Self {
            override_path: settings.ytdlp_path.clone(),
            binary: OnceCell::new(),
            user_agent: settings
                .user_agent
                .clone()
                .unwrap_or_else(|| EXTRACTOR_USER_AGENT.to_string()),
            proxy: settings.proxy.url(),
            skip_tls_verify: settings.allows_insecure_tls("www.youtube.com"),
        }
    }

    async fn binary(&self) -> anyhow::Result<&Path> {
        let path = self
            .binary
            .get_or_try_init(|| async {
                match &self.override_path {
                    Some(p) => Ok(p.clone()),
                    None => ensure_ytdlp().await,
                }
            })
            .await?;
        Ok(path.as_path())
    }

    fn base_args(&self, mode: ClientMode) -> Vec<String> {
        let mut args = vec![
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "--user-agent".to_string(),
            self.user_agent.clone(),
            "--add-header".to_string(),
            "Accept-Language:en-US,en;q=0.9".to_string(),
            "--add-header".to_string(),
            "Accept:text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        ];
        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }
        if self.skip_tls_verify {
            args.push("--no-check-certificates".to_string());
        }
        args.extend(mode_args(mode).iter().map(|s| s.to_string()));
        args
    }

    async fn dump_json(&self, page_url: &str, mode: ClientMode) -> anyhow::Result<serde_json::Value> {
        let ytdlp = self.binary().await?;
        let mut args = self.base_args(mode);
        args.push("--dump-json".to_string());
        args.push(page_url.to_string());

        tracing::debug!("[ytdlp] {:?} {}", mode, page_url);
        let output = process::command(ytdlp)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| anyhow!("failed to run yt-dlp: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("yt-dlp failed: {}", stderr.trim()));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| anyhow!("yt-dlp returned invalid JSON: {}", e))
    }
}

pub fn mode_args(mode: ClientMode) -> &'static [&'static str] {
    match mode {
        ClientMode::Standard => &[],
        ClientMode::Anonymous => &[
            "--no-cookies",
            "--extractor-args",
            "youtube:player_client=tv,web_safari",
        ],
    }
}

#[async_trait]
impl VideoExtractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn open_session(&self, page_url: &str, mode: ClientMode) -> anyhow::Result<VideoSession> {
        let json = self.dump_json(page_url, mode).await?;
        parse_session(&json, page_url, mode)
    }

    async fn list_streams(&self, session: &VideoSession) -> anyhow::Result<StreamSet> {
        let json = self.dump_json(&session.page_url, session.mode).await?;
        Ok(StreamSet::new(parse_formats(&json)?))
    }

    async fn download(
        &self,
        request: ExtractorDownload<'_>,
        on_progress: ProgressCallback<'_>,
    ) -> anyhow::Result<PathBuf> {
        let ytdlp = self.binary().await?;
        tokio::fs::create_dir_all(request.output_dir).await?;

        let output_template = request
            .output_dir
            .join(format!("{}.%(ext)s", escape_template(request.file_stem)))
            .to_string_lossy()
            .to_string();

        let mut args = self.base_args(request.mode);
        args.extend([
            "-f".to_string(),
            request.itag.to_string(),
            "--force-overwrites".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "-o".to_string(),
            output_template,
            request.page_url.to_string(),
        ]);

        let mut child = process::command(ytdlp)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| anyhow!("failed to start yt-dlp: {}", e))?;

        let stdout = child.stdout.take().ok_or_else(|| anyhow!("yt-dlp has no stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| anyhow!("yt-dlp has no stderr"))?;
        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();

        let mut tracker = ProgressTracker::default();
        let mut printed_path: Option<PathBuf> = None;
        let mut stderr_tail: Vec<String> = Vec::new();
        let (mut out_done, mut err_done) = (false, false);

        while !(out_done && err_done) {
            tokio::select! {
                line = out_lines.next_line(), if !out_done => match line {
                    Ok(Some(line)) => {
                        if let Some(tick) = tracker.feed(&line) {
                            on_progress(tick);
                        } else if !line.trim().is_empty() {
                            printed_path = Some(PathBuf::from(line.trim()));
                        }
                    }
                    _ => out_done = true,
                },
                line = err_lines.next_line(), if !err_done => match line {
                    Ok(Some(line)) => {
                        if let Some(tick) = tracker.feed(&line) {
                            on_progress(tick);
                        } else {
                            stderr_tail.push(line);
                            if stderr_tail.len() > STDERR_TAIL_LINES {
                                stderr_tail.remove(0);
                            }
                        }
                    }
                    _ => err_done = true,
                },
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| anyhow!("yt-dlp process failed: {}", e))?;

        if !status.success() {
            return Err(anyhow!(
                "yt-dlp exited with {}: {}",
                status,
                stderr_tail.join("\n").trim()
            ));
        }

        match printed_path {
            Some(p) if p.exists() => Ok(p),
            _ => find_downloaded_file(request.output_dir, request.file_stem).await,
        }
    }
}

/// Output-template literal: `%` would otherwise start a field.
fn escape_template(text: &str) -> String {
    text.replace('%', "%%")
}

/// Turns cumulative `downloaded/total` progress lines into per-chunk ticks.
#[derive(Debug, Default)]
struct ProgressTracker {
    last_downloaded: u64,
}

impl ProgressTracker {
    fn feed(&mut self, line: &str) -> Option<ProgressTick> {
        let (downloaded, total) = parse_progress_line(line)?;
        let chunk_len = downloaded.saturating_sub(self.last_downloaded);
        self.last_downloaded = downloaded;
        Some(ProgressTick {
            filesize: total,
            chunk_len,
            bytes_remaining: total.saturating_sub(downloaded),
        })
    }
}

pub fn parse_progress_line(line: &str) -> Option<(u64, u64)> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?;
    let (done, total) = rest.split_once('/')?;
    let done = done.trim().parse::<f64>().ok()?;
    let total = total.trim().parse::<f64>().ok()?;
    if !done.is_finite() || !total.is_finite() || total <= 0.0 {
        return None;
    }
    Some((done as u64, total as u64))
}

async fn find_downloaded_file(output_dir: &Path, stem: &str) -> anyhow::Result<PathBuf> {
    let mut entries = tokio::fs::read_dir(output_dir).await?;
    let mut best: Option<(PathBuf, std::time::SystemTime)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.ends_with(".part") || name.ends_with(".ytdl") || name.starts_with('.') {
            continue;
        }
        if path.file_stem().and_then(|s| s.to_str()) != Some(stem) {
            continue;
        }

        let modified = entry
            .metadata()
            .await
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        match &best {
            Some((_, best_time)) if modified <= *best_time => {}
            _ => best = Some((path, modified)),
        }
    }

    best.map(|(p, _)| p)
        .ok_or_else(|| anyhow!("downloaded file not found in {:?}", output_dir))
}

pub fn parse_session(
    json: &serde_json::Value,
    page_url: &str,
    mode: ClientMode,
) -> anyhow::Result<VideoSession> {
    let video_id = json
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("extractor response has no video id"))?;

    if json.get("is_live").and_then(|v| v.as_bool()).unwrap_or(false) {
        return Err(anyhow!("livestreams are not supported"));
    }

    let title = json
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown Title");
    let author = json
        .get("uploader")
        .or_else(|| json.get("channel"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    let length = json
        .get("duration")
        .and_then(|v| v.as_f64())
        .map(|d| d.max(0.0) as u64)
        .unwrap_or(0);
    let views = json.get("view_count").and_then(|v| v.as_u64()).unwrap_or(0);
    let thumbnail = json
        .get("thumbnail")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let streams = parse_formats(json)
        .map(StreamSet::new)
        .map_err(|e| e.to_string());

    Ok(
        VideoSession::new(video_id, page_url, mode, title, author, length, views, thumbnail)
            .with_streams(streams),
    )
}

pub fn parse_formats(json: &serde_json::Value) -> anyhow::Result<Vec<StreamFormat>> {
    let formats = json
        .get("formats")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("extractor response has no format table"))?;

    let mut result = Vec::new();
    for f in formats {
        // storyboards and other non-itag entries are skipped
        let Some(itag) = f
            .get("format_id")
            .and_then(|v| v.as_str())
            .and_then(|id| id.parse::<u32>().ok())
        else {
            continue;
        };

        let ext = f.get("ext").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let vcodec = f.get("vcodec").and_then(|v| v.as_str()).unwrap_or("none");
        let acodec = f.get("acodec").and_then(|v| v.as_str()).unwrap_or("none");
        let has_video = vcodec != "none";
        let has_audio = acodec != "none";
        if !has_audio && !has_video {
            continue;
        }

        let height = f.get("height").and_then(|v| v.as_u64()).map(|v| v as u32);
        let abr = f.get("abr").and_then(|v| v.as_f64());
        let filesize = f
            .get("filesize")
            .or_else(|| f.get("filesize_approx"))
            .and_then(|v| v.as_u64());
        let url = f.get("url").and_then(|v| v.as_str()).map(|s| s.to_string());

        result.push(StreamFormat {
            itag,
            mime_type: mime_for(&ext, has_video),
            extension: ext,
            abr_kbps: abr,
            height,
            has_audio,
            has_video,
            filesize,
            url,
        });
    }

    Ok(result)
}

fn mime_for(ext: &str, has_video: bool) -> String {
    let kind = if has_video { "video" } else { "audio" };
    let sub = match ext {
        "m4a" => "mp4",
        "mp3" => "mpeg",
        "" => "unknown",
        other => other,
    };
    format!("{}/{}", kind, sub)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Writes an executable shell script standing in for yt-dlp.
    #[cfg(unix)]
    pub(crate) fn stub_ytdlp(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("yt-dlp");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn extractor_at(binary: PathBuf) -> YtDlpExtractor {
        YtDlpExtractor::from_settings(&DownloaderSettings {
            ytdlp_path: Some(binary),
            ..DownloaderSettings::default()
        })
    }

    #[cfg(unix)]
    async fn run_download(
        extractor: &YtDlpExtractor,
        output_dir: &Path,
        file_stem: &str,
    ) -> (anyhow::Result<PathBuf>, Vec<ProgressTick>) {
        let ticks = Mutex::new(Vec::new());
        let on_progress = |tick: ProgressTick| ticks.lock().unwrap().push(tick);
        let result = extractor
            .download(
                ExtractorDownload {
                    page_url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                    mode: ClientMode::Standard,
                    itag: 251,
                    output_dir,
                    file_stem,
                },
                &on_progress,
            )
            .await;
        (result, ticks.into_inner().unwrap())
    }

    fn sample() -> serde_json::Value {
        serde_json::json!({
            "id": "dQw4w9WgXcQ",
            "title": "Never Gonna Give You Up",
            "uploader": "Rick Astley",
            "duration": 212.0,
            "view_count": 1_500_000_000u64,
            "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
            "formats": [
                {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none"},
                {"format_id": "249", "ext": "webm", "vcodec": "none", "acodec": "opus", "abr": 50.0, "filesize": 1200},
                {"format_id": "251", "ext": "webm", "vcodec": "none", "acodec": "opus", "abr": 130.5, "filesize": 3400},
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.0, "filesize_approx": 3300},
                {"format_id": "18", "ext": "mp4", "vcodec": "avc1", "acodec": "mp4a.40.2", "height": 360},
                {"format_id": "137", "ext": "mp4", "vcodec": "avc1", "acodec": "none", "height": 1080}
            ]
        })
    }

    #[test]
    fn parses_session_details() {
        let s = parse_session(&sample(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ", ClientMode::Standard)
            .unwrap();
        assert_eq!(s.video_id, "dQw4w9WgXcQ");
        assert_eq!(s.title, "Never Gonna Give You Up");
        assert_eq!(s.author, "Rick Astley");
        assert_eq!(s.length_seconds, 212);
        assert_eq!(s.views, 1_500_000_000);
        assert!(s.thumbnail_url.is_some());
        assert_eq!(s.mode, ClientMode::Standard);
    }

    #[test]
    fn parses_formats_skipping_storyboards() {
        let formats = parse_formats(&sample()).unwrap();
        let itags: Vec<u32> = formats.iter().map(|f| f.itag).collect();
        assert_eq!(itags, vec![249, 251, 140, 18, 137]);

        let m4a = formats.iter().find(|f| f.itag == 140).unwrap();
        assert_eq!(m4a.mime_type, "audio/mp4");
        assert_eq!(m4a.filesize, Some(3300));
        assert!(m4a.is_audio_only());

        let progressive = formats.iter().find(|f| f.itag == 18).unwrap();
        assert!(progressive.is_progressive());
        assert_eq!(progressive.mime_type, "video/mp4");
    }

    #[test]
    fn missing_format_table_keeps_details() {
        let mut json = sample();
        json.as_object_mut().unwrap().remove("formats");
        let s = parse_session(&json, "u", ClientMode::Anonymous).unwrap();
        assert_eq!(s.title, "Never Gonna Give You Up");
        assert!(s.streams().is_err());
    }

    #[test]
    fn livestreams_are_rejected() {
        let mut json = sample();
        json["is_live"] = serde_json::json!(true);
        assert!(parse_session(&json, "u", ClientMode::Standard).is_err());
    }

    #[test]
    fn progress_line_parsing() {
        assert_eq!(parse_progress_line("[beat-progress] 1024/4096"), Some((1024, 4096)));
        assert_eq!(parse_progress_line("  [beat-progress] 10/4096.0 "), Some((10, 4096)));
        assert_eq!(parse_progress_line("[beat-progress] 10/NA"), None);
        assert_eq!(parse_progress_line("[beat-progress] 10/0"), None);
        assert_eq!(parse_progress_line("1024/4096"), None);
        assert_eq!(parse_progress_line("/music/song.webm"), None);
    }

    #[test]
    fn tracker_emits_chunk_deltas() {
        let mut t = ProgressTracker::default();
        let a = t.feed("[beat-progress] 1000/4000").unwrap();
        assert_eq!((a.chunk_len, a.bytes_remaining, a.filesize), (1000, 3000, 4000));
        let b = t.feed("[beat-progress] 4000/4000").unwrap();
        assert_eq!((b.chunk_len, b.bytes_remaining), (3000, 0));
        assert!(t.feed("[youtube] extracting").is_none());
    }

    #[test]
    fn anonymous_mode_adds_client_args() {
        assert!(mode_args(ClientMode::Standard).is_empty());
        assert!(mode_args(ClientMode::Anonymous).contains(&"--no-cookies"));
    }

    #[test]
    fn base_args_scope_tls_and_proxy() {
        let mut settings = DownloaderSettings::default();
        let plain = YtDlpExtractor::from_settings(&settings).base_args(ClientMode::Standard);
        assert!(!plain.iter().any(|a| a == "--no-check-certificates"));
        assert!(!plain.iter().any(|a| a == "--proxy"));

        settings.insecure_tls_hosts = vec!["www.youtube.com".into()];
        settings.proxy.enabled = true;
        settings.proxy.host = "10.0.0.1".into();
        let args = YtDlpExtractor::from_settings(&settings).base_args(ClientMode::Standard);
        assert!(args.iter().any(|a| a == "--no-check-certificates"));
        assert!(args.iter().any(|a| a == "http://10.0.0.1:8080"));
    }

    #[tokio::test]
    async fn finds_file_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mysong.webm.part"), b"x").unwrap();
        std::fs::write(dir.path().join("other.webm"), b"x").unwrap();
        std::fs::write(dir.path().join("mysong.webm"), b"x").unwrap();

        let found = find_downloaded_file(dir.path(), "mysong").await.unwrap();
        assert_eq!(found, dir.path().join("mysong.webm"));
        assert!(find_downloaded_file(dir.path(), "missing").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn download_reports_progress_and_printed_path() {
        let bin_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let file = out_dir.path().join("100% fire.webm");
        let args_log = bin_dir.path().join("args.txt");
        let stub = stub_ytdlp(
            bin_dir.path(),
            &format!(
                "for a in \"$@\"; do echo \"$a\"; done > '{log}'\n\
                 echo '[youtube] dQw4w9WgXcQ: Downloading webpage' >&2\n\
                 echo '[beat-progress] 250/1000' >&2\n\
                 echo '[beat-progress] 500/1000' >&2\n\
                 echo '[beat-progress] 1000/1000' >&2\n\
                 printf 'x' > '{file}'\n\
                 echo '{file}'",
                log = args_log.display(),
                file = file.display()
            ),
        );

        let (result, ticks) =
            run_download(&extractor_at(stub), out_dir.path(), "100% fire").await;

        assert_eq!(result.unwrap(), file);
        let remaining: Vec<u64> = ticks.iter().map(|t| t.bytes_remaining).collect();
        assert_eq!(remaining, vec![750, 500, 0]);
        let chunks: Vec<u64> = ticks.iter().map(|t| t.chunk_len).collect();
        assert_eq!(chunks, vec![250, 250, 500]);
        assert!(ticks.iter().all(|t| t.filesize == 1000));

        let args = std::fs::read_to_string(&args_log).unwrap();
        let template = out_dir.path().join("100%% fire.%(ext)s");
        assert!(args.lines().any(|l| l == template.to_string_lossy()));
        assert!(args.lines().any(|l| l == PROGRESS_TEMPLATE));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn download_without_printed_path_finds_file_by_stem() {
        let bin_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let file = out_dir.path().join("mysong.m4a");
        let stub = stub_ytdlp(
            bin_dir.path(),
            &format!("printf 'x' > '{}'", file.display()),
        );

        let (result, ticks) = run_download(&extractor_at(stub), out_dir.path(), "mysong").await;

        assert_eq!(result.unwrap(), file);
        assert!(ticks.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_download_carries_stderr_tail() {
        let bin_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let stub = stub_ytdlp(
            bin_dir.path(),
            "echo 'ERROR: [youtube] dQw4w9WgXcQ: Video unavailable' >&2\nexit 1",
        );

        let (result, _ticks) = run_download(&extractor_at(stub), out_dir.path(), "mysong").await;

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Video unavailable"));
    }

    #[test]
    fn template_escapes_percent() {
        assert_eq!(escape_template("100% fire"), "100%% fire");
        assert_eq!(escape_template("plain"), "plain");
    }
}
