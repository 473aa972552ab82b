use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use emergency_beat_core::models::settings::{DownloaderSettings, ProxySettings};

pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";
pub const EXTRACTOR_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

const AUDIO_ACCEPT: &str =
    "audio/webm,audio/ogg,audio/wav,audio/*;q=0.9,application/ogg;q=0.7,video/*;q=0.6,*/*;q=0.5";
const MARKETPLACE_ORIGIN: &str = "https://www.beatstars.com";
const MARKETPLACE_REFERER: &str = "https://www.beatstars.com/";

/// Which marketplace request the header set is for. The redirect lookup
/// looks like a navigation, the byte fetch like a cross-site media request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderProfile {
    Resolve,
    Stream,
}

pub fn browser_headers(profile: HeaderProfile, user_agent: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    let ua = user_agent
        .and_then(|ua| HeaderValue::from_str(ua).ok())
        .unwrap_or_else(|| HeaderValue::from_static(CHROME_USER_AGENT));
    headers.insert(reqwest::header::USER_AGENT, ua);

    let fixed: &[(&str, &str)] = &[
        ("accept", AUDIO_ACCEPT),
        ("accept-language", "en-US,en;q=0.9"),
        ("referer", MARKETPLACE_REFERER),
        ("dnt", "1"),
        ("connection", "keep-alive"),
        ("pragma", "no-cache"),
        ("cache-control", "no-cache"),
    ];
    for (name, value) in fixed {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    let (mode, site) = match profile {
        HeaderProfile::Resolve => ("navigate", "same-origin"),
        HeaderProfile::Stream => {
            headers.insert(
                HeaderName::from_static("origin"),
                HeaderValue::from_static(MARKETPLACE_ORIGIN),
            );
            ("cors", "same-site")
        }
    };
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static(mode),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static(site),
    );

    headers
}

pub fn log_headers(tag: &str, headers: &HeaderMap) {
    for (name, value) in headers {
        tracing::debug!(
            "[{}] header {}: {}",
            tag,
            name,
            value.to_str().unwrap_or("<binary>")
        );
    }
}

pub fn apply_proxy(
    builder: reqwest::ClientBuilder,
    proxy: &ProxySettings,
) -> reqwest::ClientBuilder {
    let Some(proxy_url) = proxy.url() else {
        return builder;
    };
    match reqwest::Proxy::all(&proxy_url) {
        Ok(p) => builder.proxy(p),
        Err(e) => {
            tracing::warn!("Invalid proxy URL: {}", e);
            builder
        }
    }
}

/// Clients used by the marketplace pipeline. Certificate validation is only
/// relaxed on the separate `insecure` client, and only for hosts the caller
/// listed explicitly.
pub struct HttpClients {
    verified: reqwest::Client,
    insecure: Option<reqwest::Client>,
    insecure_hosts: Vec<String>,
}

impl HttpClients {
    pub fn from_settings(settings: &DownloaderSettings) -> anyhow::Result<Self> {
        let verified = apply_proxy(reqwest::Client::builder(), &settings.proxy)
            .build()
            .context("failed to build HTTP client")?;

        let insecure = if settings.insecure_tls_hosts.is_empty() {
            None
        } else {
            tracing::warn!(
                "TLS verification disabled for: {}",
                settings.insecure_tls_hosts.join(", ")
            );
            let client = apply_proxy(reqwest::Client::builder(), &settings.proxy)
                .danger_accept_invalid_certs(true)
                .build()
                .context("failed to build scoped insecure HTTP client")?;
            Some(client)
        };

        Ok(Self {
            verified,
            insecure,
            insecure_hosts: settings
                .insecure_tls_hosts
                .iter()
                .map(|h| h.to_lowercase())
                .collect(),
        })
    }

    pub fn for_url(&self, url: &str) -> &reqwest::Client {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()));

        match (&self.insecure, host) {
            (Some(insecure), Some(host)) if self.insecure_hosts.contains(&host) => insecure,
            _ => &self.verified,
        }
    }
}
