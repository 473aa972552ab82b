use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceHint {
    BeatMarketplace,
    YouTube,
}

impl ServiceHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceHint::BeatMarketplace => "beatstars",
            ServiceHint::YouTube => "youtube",
        }
    }
}

impl fmt::Display for ServiceHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the presentation layer sends to start one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartCommand {
    pub raw_input: String,
    #[serde(default)]
    pub desired_filename: Option<String>,
    #[serde(default)]
    pub destination_dir: Option<PathBuf>,
}

impl StartCommand {
    pub fn new(raw_input: impl Into<String>) -> Self {
        Self {
            raw_input: raw_input.into(),
            ..Self::default()
        }
    }

    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        self.desired_filename = Some(name.into());
        self
    }

    pub fn with_destination(mut self, dir: impl Into<PathBuf>) -> Self {
        self.destination_dir = Some(dir.into());
        self
    }
}

/// A start command bound to a service. Frozen once a worker picks it up.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadRequest {
    raw_input: String,
    desired_filename: Option<String>,
    destination_dir: Option<PathBuf>,
    service_hint: ServiceHint,
}

impl DownloadRequest {
    pub fn new(service_hint: ServiceHint, command: StartCommand) -> Self {
        Self {
            raw_input: command.raw_input,
            desired_filename: command.desired_filename,
            destination_dir: command.destination_dir,
            service_hint,
        }
    }

    pub fn raw_input(&self) -> &str {
        &self.raw_input
    }

    pub fn desired_filename(&self) -> Option<&str> {
        self.desired_filename.as_deref()
    }

    pub fn destination_dir(&self) -> Option<&Path> {
        self.destination_dir.as_deref()
    }

    pub fn service_hint(&self) -> ServiceHint {
        self.service_hint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_keeps_command_fields() {
        let cmd = StartCommand::new("123456789")
            .with_filename("mysong")
            .with_destination("/tmp/out");
        let req = DownloadRequest::new(ServiceHint::BeatMarketplace, cmd);
        assert_eq!(req.raw_input(), "123456789");
        assert_eq!(req.desired_filename(), Some("mysong"));
        assert_eq!(req.destination_dir(), Some(Path::new("/tmp/out")));
        assert_eq!(req.service_hint(), ServiceHint::BeatMarketplace);
    }

    #[test]
    fn service_hint_serializes_snake_case() {
        let json = serde_json::to_string(&ServiceHint::BeatMarketplace).unwrap();
        assert_eq!(json, "\"beat_marketplace\"");
        assert_eq!(ServiceHint::YouTube.to_string(), "youtube");
    }
}
