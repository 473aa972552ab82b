use std::sync::LazyLock;

use regex::Regex;

use emergency_beat_core::core::error::DownloadError;
use emergency_beat_core::models::media::CanonicalIdentifier;
use emergency_beat_core::models::request::ServiceHint;

/// Path marker present in every marketplace beat link, on the main site
/// and on producer subdomains alike.
pub const BEAT_PATH_MARKER: &str = "/beat/";

const VIDEO_ID: &str = r"([0-9A-Za-z_-]{11})(?:[^0-9A-Za-z_-]|$)";

static VIDEO_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        format!(r"[?&]v=(?:{})", VIDEO_ID),
        format!(r"youtu\.be/(?:{})", VIDEO_ID),
        format!(r"/embed/(?:{})", VIDEO_ID),
        format!(r"/shorts/(?:{})", VIDEO_ID),
        format!(r"/(?:v|vi|live)/(?:{})", VIDEO_ID),
        format!(r"^(?:{})", VIDEO_ID),
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

pub fn normalize(
    raw_input: &str,
    service: ServiceHint,
) -> Result<CanonicalIdentifier, DownloadError> {
    let input = raw_input.trim();
    if input.is_empty() {
        return Err(DownloadError::empty_input());
    }

    let value = match service {
        ServiceHint::BeatMarketplace => extract_beat_id(input),
        ServiceHint::YouTube => {
            extract_video_id(input).ok_or_else(DownloadError::unrecognized_input)?
        }
    };

    Ok(CanonicalIdentifier::new(service, value))
}

/// Pulls the numeric id out of a beat link. Anything that does not look
/// like a beat link, or a link with no recognizable id, is returned as is
/// and treated as already canonical.
pub fn extract_beat_id(input: &str) -> String {
    if !input.contains(BEAT_PATH_MARKER) {
        return input.to_string();
    }

    let path = input
        .split(['?', '#'])
        .next()
        .unwrap_or(input);
    let parts: Vec<&str> = path.split('/').collect();

    if let Some(last) = parts.last() {
        if is_all_digits(last) {
            return last.to_string();
        }
    }

    for part in &parts {
        if part.contains('-') {
            if let Some(candidate) = part.rsplit('-').next() {
                if is_all_digits(candidate) {
                    return candidate.to_string();
                }
            }
        }
    }

    input.to_string()
}

pub fn extract_video_id(input: &str) -> Option<String> {
    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(input))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
