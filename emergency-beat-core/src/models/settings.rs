use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_STREAM_ENDPOINT: &str = "https://main.v2.beatstars.com/stream";
pub const DEFAULT_FILENAME: &str = "beat.mp3";
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Known audio-only itags, most preferred first. 18 is a progressive
/// fallback that still carries an audio track.
pub const DEFAULT_AUDIO_ITAGS: [u32; 7] = [251, 140, 250, 249, 139, 171, 18];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderSettings {
    #[serde(default = "default_stream_endpoint")]
    pub stream_endpoint: String,
    #[serde(default = "default_filename")]
    pub default_filename: String,
    #[serde(default = "default_output_dir")]
    pub default_output_dir: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,
    #[serde(default = "default_audio_itags")]
    pub audio_itags: Vec<u32>,
    #[serde(default = "default_true")]
    pub transcode_to_mp3: bool,
    /// Hosts for which a scoped client without certificate validation is
    /// used. Empty means every request is verified.
    #[serde(default)]
    pub insecure_tls_hosts: Vec<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub proxy: ProxySettings,
}

fn default_stream_endpoint() -> String {
    DEFAULT_STREAM_ENDPOINT.into()
}

fn default_filename() -> String {
    DEFAULT_FILENAME.into()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_audio_itags() -> Vec<u32> {
    DEFAULT_AUDIO_ITAGS.to_vec()
}

fn default_true() -> bool {
    true
}

impl Default for DownloaderSettings {
    fn default() -> Self {
        Self {
            stream_endpoint: default_stream_endpoint(),
            default_filename: default_filename(),
            default_output_dir: default_output_dir(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            ytdlp_path: None,
            audio_itags: default_audio_itags(),
            transcode_to_mp3: true,
            insecure_tls_hosts: Vec::new(),
            user_agent: None,
            proxy: ProxySettings::default(),
        }
    }
}

impl DownloaderSettings {
    pub fn allows_insecure_tls(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.insecure_tls_hosts
            .iter()
            .any(|h| h.eq_ignore_ascii_case(&host))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_proxy_type")]
    pub proxy_type: String,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_proxy_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_proxy_type() -> String {
    "http".into()
}

fn default_proxy_port() -> u16 {
    8080
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            proxy_type: default_proxy_type(),
            host: String::new(),
            port: default_proxy_port(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl ProxySettings {
    pub fn url(&self) -> Option<String> {
        if !self.enabled || self.host.is_empty() {
            return None;
        }
        let scheme = match self.proxy_type.as_str() {
            "socks5" => "socks5",
            "https" => "https",
            _ => "http",
        };
        if !self.username.is_empty() {
            Some(format!(
                "{}://{}:{}@{}:{}",
                scheme, self.username, self.password, self.host, self.port
            ))
        } else {
            Some(format!("{}://{}:{}", scheme, self.host, self.port))
        }
    }
}
