use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Normalization,
    Resolution,
    Retrieval,
    Unexpected,
}

/// Coarse category the presentation layer uses to pick guidance text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Triage {
    ProtectedContent,
    MalformedRequest,
    InvalidInput,
    Transient,
}

impl Triage {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 | 451 => Triage::ProtectedContent,
            400 | 404 | 410 => Triage::MalformedRequest,
            _ => Triage::Transient,
        }
    }

    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Triage::ProtectedContent => Some(
                "Access was denied. The content may be protected or not available for download.",
            ),
            Triage::MalformedRequest => Some(
                "The request was rejected. Check that the ID or link is correct and points to a public item.",
            ),
            Triage::InvalidInput => Some("Enter a valid beat ID, beat link or YouTube link."),
            Triage::Transient => None,
        }
    }
}

fn status_hint(status: &u16) -> &'static str {
    match Triage::from_status(*status) {
        Triage::ProtectedContent => "The beat may be protected or not available for download.",
        Triage::MalformedRequest => "The request was malformed or the item is unknown.",
        _ => "The server refused the download.",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("{0}")]
    Normalization(String),
    #[error("Error resolving stream: {0}")]
    Resolution(String),
    /// Non-200 answer from the origin. `stage` is `Resolution` or `Retrieval`.
    #[error("Received status code {status}. {}", status_hint(.status))]
    HttpStatus { stage: ErrorKind, status: u16 },
    #[error("Error downloading file: {0}")]
    Retrieval(String),
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl DownloadError {
    pub fn empty_input() -> Self {
        DownloadError::Normalization("empty input".into())
    }

    pub fn unrecognized_input() -> Self {
        DownloadError::Normalization("could not extract identifier".into())
    }

    pub fn retrieval_status(status: u16) -> Self {
        DownloadError::HttpStatus {
            stage: ErrorKind::Retrieval,
            status,
        }
    }

    pub fn resolution_status(status: u16) -> Self {
        DownloadError::HttpStatus {
            stage: ErrorKind::Resolution,
            status,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::Normalization(_) => ErrorKind::Normalization,
            DownloadError::Resolution(_) => ErrorKind::Resolution,
            DownloadError::HttpStatus { stage, .. } => *stage,
            DownloadError::Retrieval(_) => ErrorKind::Retrieval,
            DownloadError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            DownloadError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn triage(&self) -> Triage {
        match self {
            DownloadError::Normalization(_) => Triage::InvalidInput,
            DownloadError::HttpStatus { status, .. } => Triage::from_status(*status),
            _ => Triage::Transient,
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        DownloadError::Retrieval(e.to_string())
    }
}
