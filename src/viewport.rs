use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// One capture width, optionally pinned to its own device-scale factor.
///
/// Written as `320` or `320@2` in config files and on the command line. A
/// viewport without an explicit scale uses the tester-wide factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ViewportSpec", into = "String")]
pub struct Viewport {
    pub width: u32,
    pub device_scale_factor: Option<f64>,
}

impl Viewport {
    pub const fn new(width: u32) -> Self {
        Self {
            width,
            device_scale_factor: None,
        }
    }

    pub const fn with_scale(width: u32, device_scale_factor: f64) -> Self {
        Self {
            width,
            device_scale_factor: Some(device_scale_factor),
        }
    }

    /// Scale factor to apply, falling back to the tester-wide one.
    pub fn scale_or(&self, fallback: f64) -> f64 {
        self.device_scale_factor.unwrap_or(fallback)
    }
}

impl From<u32> for Viewport {
    fn from(width: u32) -> Self {
        Viewport::new(width)
    }
}

/// Initial page height used before content is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    /// Open the page one pixel tall, then grow to content height.
    #[default]
    Auto,
    /// Open the page as tall as it is wide, then grow to content height.
    SquareAuto,
}

impl CaptureMode {
    pub fn initial_height(self, width: u32) -> u32 {
        match self {
            CaptureMode::Auto => 1,
            CaptureMode::SquareAuto => width,
        }
    }
}

#[derive(Debug, Error)]
pub enum ViewportParseError {
    #[error("Invalid viewport format: expected WIDTH or WIDTH@SCALE (e.g., 320 or 320@2)")]
    InvalidFormat,
    #[error("Invalid viewport width: {0}")]
    InvalidWidth(String),
    #[error("Invalid viewport scale factor: {0}")]
    InvalidScale(String),
    #[error("Viewport width must be positive")]
    ZeroWidth,
    #[error("Viewport scale factor must be positive")]
    NonPositiveScale,
}

impl FromStr for Viewport {
    type Err = ViewportParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('@').collect();
        if parts.is_empty() || parts.len() > 2 {
            return Err(ViewportParseError::InvalidFormat);
        }

        let width: u32 = parts[0]
            .trim()
            .parse()
            .map_err(|_| ViewportParseError::InvalidWidth(parts[0].trim().to_string()))?;
        if width == 0 {
            return Err(ViewportParseError::ZeroWidth);
        }

        let device_scale_factor = match parts.get(1) {
            Some(raw) => {
                let raw = raw.trim().trim_end_matches('x');
                let scale: f64 = raw
                    .parse()
                    .map_err(|_| ViewportParseError::InvalidScale(raw.to_string()))?;
                if !(scale > 0.0) || !scale.is_finite() {
                    return Err(ViewportParseError::NonPositiveScale);
                }
                Some(scale)
            }
            None => None,
        };

        Ok(Viewport {
            width,
            device_scale_factor,
        })
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.device_scale_factor {
            Some(scale) => write!(f, "{}@{}", self.width, scale),
            None => write!(f, "{}", self.width),
        }
    }
}

impl From<Viewport> for String {
    fn from(vp: Viewport) -> Self {
        vp.to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ViewportSpec {
    Width(u32),
    Text(String),
}

impl TryFrom<ViewportSpec> for Viewport {
    type Error = ViewportParseError;

    fn try_from(spec: ViewportSpec) -> Result<Self, Self::Error> {
        match spec {
            ViewportSpec::Width(0) => Err(ViewportParseError::ZeroWidth),
            ViewportSpec::Width(width) => Ok(Viewport::new(width)),
            ViewportSpec::Text(text) => text.parse(),
        }
    }
}
