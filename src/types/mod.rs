//! Core types used throughout the tester.
//!
//! - [`core`] - element geometry and integer bounding boxes
//! - [`outcome`] - diff results and per-test outcomes

pub mod core;
pub mod outcome;

pub use self::core::{BoundingBox, ElementRect};
pub use self::outcome::{DiffResult, TestOutcome, ViewportReport, ViewportStatus};
pub use crate::viewport::{CaptureMode, Viewport};
