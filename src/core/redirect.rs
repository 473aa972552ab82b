use reqwest::header::HeaderMap;

use emergency_beat_core::core::error::DownloadError;

#[derive(Debug, Clone, PartialEq)]
pub struct RedirectTarget {
    pub final_url: String,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
}

/// Follows the redirect chain for `url` and reports where it ended. The body
/// is never read; the response is dropped once headers arrive.
pub async fn resolve_redirect(
    client: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
) -> Result<RedirectTarget, DownloadError> {
    let response = client
        .get(url)
        .headers(headers)
        .send()
        .await
        .map_err(|e| DownloadError::Resolution(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!("[redirect] {} answered HTTP {}", url, status);
        return Err(DownloadError::resolution_status(status.as_u16()));
    }

    let final_url = response.url().to_string();
    if final_url == url {
        tracing::debug!("[redirect] no redirect for {}", url);
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    Ok(RedirectTarget {
        final_url,
        content_length: response.content_length(),
        content_type,
    })
}
