use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::viewport::Viewport;

/// Result of comparing a candidate capture against its fixture.
#[derive(Debug, Clone)]
pub struct DiffResult {
    /// Pixels whose colour distance exceeded the tolerance.
    pub differing_pixels: u64,
    /// `differing_pixels` over the compared area, in `[0, 1]`.
    pub differing_fraction: f64,
    /// Rendered diff; absent when nothing differs.
    pub diff_image: Option<RgbaImage>,
}

impl DiffResult {
    pub fn identical() -> Self {
        Self {
            differing_pixels: 0,
            differing_fraction: 0.0,
            diff_image: None,
        }
    }

    /// Any differing pixel, however few, is a regression.
    pub fn is_regression(&self) -> bool {
        self.differing_pixels > 0
    }
}

/// What happened to one viewport during a test call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewportStatus {
    /// No fixture existed; the capture was stored as the new fixture.
    Recorded,
    /// Compared against the fixture without any differing pixel.
    Passed,
    /// Compared against the fixture and differed.
    Regressed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportReport {
    pub viewport: Viewport,
    pub status: ViewportStatus,
    pub differing_fraction: f64,
}

/// Aggregated result of one `test` call across all configured viewports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub snapshot_id: String,
    /// Per-viewport results, in configured viewport order.
    pub viewports: Vec<ViewportReport>,
}

impl TestOutcome {
    pub fn new(snapshot_id: impl Into<String>) -> Self {
        Self {
            snapshot_id: snapshot_id.into(),
            viewports: Vec::new(),
        }
    }

    pub fn has_regressions(&self) -> bool {
        self.viewports
            .iter()
            .any(|report| report.status == ViewportStatus::Regressed)
    }

    pub fn failing_viewports(&self) -> Vec<Viewport> {
        self.with_status(ViewportStatus::Regressed)
    }

    pub fn recorded_viewports(&self) -> Vec<Viewport> {
        self.with_status(ViewportStatus::Recorded)
    }

    fn with_status(&self, status: ViewportStatus) -> Vec<Viewport> {
        self.viewports
            .iter()
            .filter(|report| report.status == status)
            .map(|report| report.viewport)
            .collect()
    }
}
