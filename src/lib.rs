//! Visual Regression Tester (VRT) Library
//!
//! Captures a page at a set of viewports, paints opaque masks over dynamic
//! regions, and diffs each capture against a stored fixture image.
//!
//! # Module Overview
//!
//! - [`browser`] - Collaborator traits and the chromium backend
//! - [`network_idle`] - Waits for a page's network activity to settle
//! - [`mask`] - Bounding-box resolution and mask compositing
//! - [`capture`] - Screenshot capture and decode
//! - [`diff`] - Tolerant pixel diff
//! - [`fixtures`] - Fixture/result file naming and persistence
//! - [`tester`] - Per-viewport test orchestration
//! - [`config`] - Configuration file support and layered settings
//! - [`output`] - JSON output schemas
//!
//! # Example
//!
//! ```no_run
//! use vrt_lib::{diff_images, load_image, DiffOptions};
//! use std::path::Path;
//!
//! # fn example() -> vrt_lib::Result<()> {
//! let fixture = load_image(Path::new("vrt/fixtures/home.320.png"))?;
//! let candidate = load_image(Path::new("vrt/results/home.320.png"))?;
//! let result = diff_images(&fixture, &candidate, &DiffOptions::default());
//! println!("{:.4}% differs", result.differing_fraction * 100.0);
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod capture;
pub mod config;
pub mod diff;
pub mod error;
pub mod fixtures;
pub mod mask;
pub mod network_idle;
pub mod output;
pub mod tester;
pub mod types;
pub mod viewport;

pub use browser::{
    scoped_selector, BrowserDriver, BrowserOptions, ElementHandle, NetworkEvent,
    NetworkEventStream, PageDriver,
};
#[cfg(feature = "chromium")]
pub use browser::{ChromiumBrowser, ChromiumElement, ChromiumPage};
pub use capture::{capture_snapshot, CaptureRequest};
pub use config::{resolve_settings, Config, EffectiveSettings, SettingsLayer, WaitUntil};
pub use diff::{diff_images, DiffOptions};
pub use error::{ErrorCategory, ErrorPayload, Result, VrtError};
pub use fixtures::{load_image, save_image, FixtureError, SnapshotPaths};
pub use mask::{
    clip_mask_boxes, collect_mask_rects, paint_masks, plan_masks,
    resolve_bounding_box, resolve_mask_rect, MaskOptions, MaskPlan, MaskRegion, MASK_COLOR,
};
pub use network_idle::{IdleTracker, NetworkIdle, TimerCommand};
pub use output::{DiffOutput, ErrorOutput, TestOutput, VrtOutput, VRT_OUTPUT_VERSION};
pub use tester::{ProgressCallback, Session, TestOptions, VisualRegressionTester};
pub use types::{
    BoundingBox, CaptureMode, DiffResult, ElementRect, TestOutcome, Viewport, ViewportReport,
    ViewportStatus,
};
