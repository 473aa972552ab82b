use std::path::Path;

/// Audio container as far as we can tell from a mime type, an extension or
/// the first bytes of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Mp3,
    M4a,
    Mp4,
    Webm,
    Ogg,
    Unknown,
}

impl Container {
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        match essence.as_str() {
            "audio/mpeg" | "audio/mp3" | "audio/mpeg3" => Container::Mp3,
            "audio/mp4" | "audio/x-m4a" | "audio/aac" => Container::M4a,
            "video/mp4" => Container::Mp4,
            "audio/webm" | "video/webm" => Container::Webm,
            "audio/ogg" | "application/ogg" => Container::Ogg,
            _ => Container::Unknown,
        }
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "mp3" => Container::Mp3,
            "m4a" | "aac" => Container::M4a,
            "mp4" => Container::Mp4,
            "webm" | "weba" => Container::Webm,
            "ogg" | "oga" | "opus" => Container::Ogg,
            _ => Container::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Container::Unknown)
    }

    pub fn sniff(head: &[u8]) -> Self {
        if head.starts_with(b"ID3") {
            return Container::Mp3;
        }
        if head.len() >= 2 && head[0] == 0xFF && (head[1] & 0xE0) == 0xE0 {
            return Container::Mp3;
        }
        if head.len() >= 12 && &head[4..8] == b"ftyp" {
            return match &head[8..12] {
                b"M4A " | b"M4B " => Container::M4a,
                _ => Container::Mp4,
            };
        }
        if head.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            return Container::Webm;
        }
        if head.starts_with(b"OggS") {
            return Container::Ogg;
        }
        Container::Unknown
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mp3 => "mp3",
            Container::M4a => "m4a",
            Container::Mp4 => "mp4",
            Container::Webm => "webm",
            Container::Ogg => "ogg",
            Container::Unknown => "bin",
        }
    }

    pub fn is_mp3(&self) -> bool {
        matches!(self, Container::Mp3)
    }
}
