use crate::fixtures::FixtureError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VrtError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl VrtError {
    pub fn browser(message: impl Into<String>) -> Self {
        VrtError::Browser(message.into())
    }

    pub fn capture(message: impl Into<String>) -> Self {
        VrtError::Capture(message.into())
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            VrtError::Io(e) => ErrorPayload::new(
                ErrorCategory::Io,
                e.to_string(),
                "Check fixture/results directory paths and permissions.",
            ),
            VrtError::Image(e) => ErrorPayload::new(
                ErrorCategory::Image,
                e.to_string(),
                "Verify the image is a readable PNG; delete a corrupt fixture to re-record it.",
            ),
            VrtError::Serialization(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check JSON inputs; run with --verbose for details.",
            ),
            VrtError::ConfigParse(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Fix the TOML syntax; durations use humantime strings such as \"500ms\" or \"30s\".",
            ),
            VrtError::Browser(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("timeout") || lower.contains("timed out") {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Increase the navigation timeout or make sure the page stops issuing requests above the allowed in-flight count.",
                    )
                } else if lower.contains("chromium") || lower.contains("executable") {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Install Chrome/Chromium or pass its path with --chrome.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Re-run with --verbose to see browser events.",
                    )
                }
            }
            VrtError::Capture(msg) => ErrorPayload::new(
                ErrorCategory::Capture,
                msg.to_string(),
                "Check that the element selector matches a rendered element.",
            ),
            VrtError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("viewport") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Viewports are positive widths, optionally with a scale factor (e.g. 320 or 320@2).",
                    )
                } else if lower.contains("tolerance") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Tolerance is a per-pixel colour distance between 0 and 1.",
                    )
                } else if lower.contains("file not found") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Verify the file exists; use an absolute path or run from the working directory.",
                    )
                } else if lower.contains("chromium feature") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Rebuild with `--features chromium` to drive a real browser.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Check flags/paths and the config file.",
                    )
                }
            }
            VrtError::Unknown(msg) => ErrorPayload::new(
                ErrorCategory::Unknown,
                msg.to_string(),
                "Re-run with --verbose; file an issue if persistent.",
            ),
        }
    }
}

impl From<FixtureError> for VrtError {
    fn from(err: FixtureError) -> Self {
        match err {
            FixtureError::Decode(e) => VrtError::Image(e),
            FixtureError::NotFound(path) => VrtError::Config(format!("File not found: {}", path)),
            FixtureError::Io(e) => VrtError::Io(e),
            FixtureError::Save(msg) => VrtError::Io(std::io::Error::other(format!(
                "Failed to save image: {}",
                msg
            ))),
        }
    }
}

pub type Result<T> = std::result::Result<T, VrtError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Io,
    Browser,
    Capture,
    Image,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}
