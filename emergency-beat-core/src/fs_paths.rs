use std::path::{Path, PathBuf};

pub const MP3_EXTENSION: &str = "mp3";

pub trait AppPaths: Send + Sync {
    fn bin_dir(&self) -> Option<PathBuf>;
}

pub struct DesktopPaths;

impl AppPaths for DesktopPaths {
    fn bin_dir(&self) -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("emergency-beat").join("bin"))
    }
}

/// Applies the output naming policy: a caller-supplied name gets a `.mp3`
/// suffix when it lacks one; no name (or a blank one) falls back to `default`.
pub fn output_filename(desired: Option<&str>, default: &str) -> String {
    let name = desired
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|n| {
            let clean = sanitize_filename::sanitize(n);
            if clean != n {
                tracing::debug!("sanitized output name {:?} -> {:?}", n, clean);
            }
            clean
        })
        .filter(|n| !n.is_empty());

    match name {
        None => default.to_string(),
        Some(n) if n.to_lowercase().ends_with(".mp3") => n,
        Some(n) => format!("{}.{}", n, MP3_EXTENSION),
    }
}

pub fn destination_path(dir: Option<&Path>, fallback_dir: &Path, filename: &str) -> PathBuf {
    dir.unwrap_or(fallback_dir).join(filename)
}
