use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::header::HeaderMap;
use tokio::io::AsyncWriteExt;

use emergency_beat_core::core::error::DownloadError;

use crate::core::http_client;
use crate::core::reporter::Reporter;

/// Progress reported once the origin answered 200, before any byte lands.
pub const TRANSFER_STARTED_PERCENT: u8 = 50;
const SNIFF_LEN: usize = 16;
const ERROR_BODY_PREVIEW: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub bytes_written: u64,
    /// First bytes of the body, for container sniffing.
    pub head: Vec<u8>,
}

/// `floor(70 + 30 * done / total)`, capped at 100.
pub fn transfer_progress(done: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let pct = 70 + (30 * u128::from(done)) / u128::from(total);
    Some(pct.min(100) as u8)
}

pub fn part_path_for(output: &Path) -> PathBuf {
    let mut part = output.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

/// Streams `url` into `output` in `chunk_size` pieces. Nothing is created on
/// disk unless the origin answers 200, and a failed transfer removes its
/// partial file.
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
    output: &Path,
    chunk_size: usize,
    expected_size: Option<u64>,
    reporter: &Reporter,
) -> Result<Transfer, DownloadError> {
    http_client::log_headers("direct", &headers);
    tracing::debug!("[direct] downloading from {}", url);

    let response = client
        .get(url)
        .headers(headers)
        .send()
        .await
        .map_err(|e| DownloadError::Retrieval(e.to_string()))?;

    let status = response.status();
    tracing::debug!("[direct] response status {}", status);

    if status != reqwest::StatusCode::OK {
        tracing::warn!("[direct] bad response: HTTP {}", status);
        tracing::warn!("[direct] response headers: {:?}", response.headers());
        if let Ok(body) = response.text().await {
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
            tracing::warn!("[direct] response content: {}", preview);
        }
        return Err(DownloadError::retrieval_status(status.as_u16()));
    }

    reporter.progress(TRANSFER_STARTED_PERCENT);

    let total = response.content_length().or(expected_size);
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let part_path = part_path_for(output);
    let outcome = match write_body(response, &part_path, chunk_size.max(1), total, reporter).await
    {
        Ok(transfer) => tokio::fs::rename(&part_path, output)
            .await
            .map(|()| transfer)
            .map_err(DownloadError::from),
        Err(e) => Err(e),
    };

    if outcome.is_err() {
        if let Err(e) = tokio::fs::remove_file(&part_path).await {
            tracing::debug!("[direct] could not remove {}: {}", part_path.display(), e);
        }
    }
    outcome
}

struct ChunkWriter<'a> {
    file: tokio::fs::File,
    written: u64,
    head: Vec<u8>,
    total: Option<u64>,
    reporter: &'a Reporter,
}

impl ChunkWriter<'_> {
    async fn write_piece(&mut self, piece: &[u8]) -> Result<(), DownloadError> {
        self.file
            .write_all(piece)
            .await
            .map_err(|e| DownloadError::Retrieval(format!("write error (disk full?): {}", e)))?;
        self.written += piece.len() as u64;

        if self.head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - self.head.len()).min(piece.len());
            self.head.extend_from_slice(&piece[..take]);
        }

        if let Some(pct) = self.total.and_then(|t| transfer_progress(self.written, t)) {
            self.reporter.progress(pct);
        }
        Ok(())
    }
}

/// Re-frames the body into exact `chunk_size` pieces regardless of how the
/// network delivered it; only the last piece may be shorter.
async fn write_body(
    response: reqwest::Response,
    part_path: &Path,
    chunk_size: usize,
    total: Option<u64>,
    reporter: &Reporter,
) -> Result<Transfer, DownloadError> {
    let file = tokio::fs::File::create(part_path).await?;
    let mut writer = ChunkWriter {
        file,
        written: 0,
        head: Vec::with_capacity(SNIFF_LEN),
        total,
        reporter,
    };
    let mut carry: Vec<u8> = Vec::with_capacity(chunk_size);
    let mut stream = response.bytes_stream();

    while let Some(next) = stream.next().await {
        let data = next.map_err(|e| DownloadError::Retrieval(e.to_string()))?;
        let mut rest: &[u8] = &data;

        if !carry.is_empty() {
            let take = (chunk_size - carry.len()).min(rest.len());
            carry.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if carry.len() == chunk_size {
                writer.write_piece(&carry).await?;
                carry.clear();
            }
        }

        while rest.len() >= chunk_size {
            writer.write_piece(&rest[..chunk_size]).await?;
            rest = &rest[chunk_size..];
        }
        carry.extend_from_slice(rest);
    }

    if !carry.is_empty() {
        writer.write_piece(&carry).await?;
    }
    writer.file.flush().await?;

    Ok(Transfer {
        bytes_written: writer.written,
        head: writer.head,
    })
}
