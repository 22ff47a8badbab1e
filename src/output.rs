use crate::error::ErrorPayload;
use crate::types::{TestOutcome, Viewport, ViewportReport};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Schema version for output payloads.
pub const VRT_OUTPUT_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum VrtOutput {
    Diff(DiffOutput),
    Test(TestOutput),
    Error(ErrorOutput),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffOutput {
    pub version: String,
    pub fixture: PathBuf,
    pub candidate: PathBuf,
    pub tolerance: f64,
    pub differing_pixels: u64,
    pub differing_fraction: f64,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_image: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutput {
    pub version: String,
    pub snapshot_id: String,
    pub url: String,
    pub passed: bool,
    pub viewports: Vec<ViewportReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failing_viewports: Vec<Viewport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recorded_viewports: Vec<Viewport>,
}

impl TestOutput {
    pub fn from_outcome(url: impl Into<String>, outcome: &TestOutcome) -> Self {
        Self {
            version: VRT_OUTPUT_VERSION.to_string(),
            snapshot_id: outcome.snapshot_id.clone(),
            url: url.into(),
            passed: !outcome.has_regressions(),
            viewports: outcome.viewports.clone(),
            failing_viewports: outcome.failing_viewports(),
            recorded_viewports: outcome.recorded_viewports(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub error: ErrorPayload,
}
