use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::request::ServiceHint;

/// Minimal service-specific key: a numeric beat id or an 11-char video id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalIdentifier {
    service: ServiceHint,
    value: String,
}

impl CanonicalIdentifier {
    pub fn new(service: ServiceHint, value: impl Into<String>) -> Self {
        Self {
            service,
            value: value.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn service(&self) -> ServiceHint {
        self.service
    }
}

impl fmt::Display for CanonicalIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// A directly fetchable media location, consumed once by the retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStream {
    pub final_url: String,
    pub expected_size_bytes: Option<u64>,
    pub mime_hint: Option<String>,
    /// Extractor encoding id (YouTube itag) chosen during resolution.
    #[serde(default)]
    pub encoding_id: Option<u32>,
    /// Page the extractor session was opened against.
    #[serde(default)]
    pub page_url: Option<String>,
    /// The extractor session was opened in its non-interactive client mode.
    #[serde(default)]
    pub anonymous_client: bool,
}

impl ResolvedStream {
    pub fn direct(final_url: impl Into<String>) -> Self {
        Self {
            final_url: final_url.into(),
            expected_size_bytes: None,
            mime_hint: None,
            encoding_id: None,
            page_url: None,
            anonymous_client: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioEncoding {
    pub encoding_id: u32,
    pub average_bitrate_kbps: Option<f64>,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub author: String,
    pub duration_seconds: u64,
    pub view_count: u64,
    pub thumbnail_url: Option<String>,
    /// Sorted by descending bitrate. Empty when the listing step failed.
    pub available_audio_encodings: Vec<AudioEncoding>,
}
