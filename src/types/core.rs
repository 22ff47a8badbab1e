//! Geometry types shared by the resolver, the compositor and the browser backends.
//!
//! - [`ElementRect`] - live element geometry as reported by the browser (CSS px)
//! - [`BoundingBox`] - integer pixel box, outward-rounded, possibly off-canvas

use serde::{Deserialize, Serialize};

/// Rendered rectangle of an element in page coordinates (CSS pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Grows the rect by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + margin * 2.0,
            height: self.height + margin * 2.0,
        }
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Maps CSS pixels to device pixels without rounding.
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

/// Integer pixel box. Coordinates may be negative or exceed the canvas until clipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl BoundingBox {
    pub const fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest integer box containing `rect` (floor on the lower edges, ceil on the upper).
    pub fn enclosing(rect: &ElementRect) -> Self {
        let left = rect.x.floor();
        let top = rect.y.floor();
        let right = (rect.x + rect.width).ceil();
        let bottom = (rect.y + rect.height).ceil();
        Self {
            x: left as i64,
            y: top as i64,
            width: (right - left) as i64,
            height: (bottom - top) as i64,
        }
    }

    pub const fn right(&self) -> i64 {
        self.x + self.width
    }

    pub const fn bottom(&self) -> i64 {
        self.y + self.height
    }

    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Clips the box to the region `[0, width) x [0, height)`.
    ///
    /// Returns `None` when nothing of positive area remains.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<Self> {
        let mut clipped = *self;

        if clipped.right() > i64::from(width) {
            clipped.width = i64::from(width) - clipped.x;
        }
        if clipped.bottom() > i64::from(height) {
            clipped.height = i64::from(height) - clipped.y;
        }
        if clipped.x < 0 {
            clipped.width += clipped.x;
            clipped.x = 0;
        }
        if clipped.y < 0 {
            clipped.height += clipped.y;
            clipped.y = 0;
        }

        (!clipped.is_empty()).then_some(clipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_grows_symmetrically() {
        let rect = ElementRect::new(10.0, 20.0, 30.0, 40.0).expand(1.0);
        assert_eq!(rect, ElementRect::new(9.0, 19.0, 32.0, 42.0));
    }

    #[test]
    fn translate_and_scale_keep_fractions() {
        let rect = ElementRect::new(20.2, 5.0, 10.0, 4.5)
            .translate(-10.6, -0.5)
            .scale(2.0);
        assert!((rect.x - 19.2).abs() < 1e-9);
        assert!((rect.y - 9.0).abs() < 1e-9);
        assert!((rect.width - 20.0).abs() < 1e-9);
        assert!((rect.height - 9.0).abs() < 1e-9);
    }

    #[test]
    fn enclosing_rounds_outward() {
        let bbox = BoundingBox::enclosing(&ElementRect::new(9.5, 19.25, 31.0, 41.5));
        assert_eq!(bbox, BoundingBox::new(9, 19, 32, 42));
        assert_eq!(bbox.right(), 41);
        assert_eq!(bbox.bottom(), 61);
    }

    #[test]
    fn enclosing_keeps_zero_sized_rect_empty() {
        let bbox = BoundingBox::enclosing(&ElementRect::new(5.0, 5.0, 0.0, 0.0));
        assert!(bbox.is_empty());
    }

    #[test]
    fn clip_shrinks_overhang_on_far_edges() {
        let clipped = BoundingBox::new(90, 40, 20, 20).clip_to(100, 50).unwrap();
        assert_eq!(clipped, BoundingBox::new(90, 40, 10, 10));
    }

    #[test]
    fn clip_clamps_origin_and_shrinks_by_overhang() {
        let clipped = BoundingBox::new(-5, -3, 20, 10).clip_to(100, 50).unwrap();
        assert_eq!(clipped, BoundingBox::new(0, 0, 15, 7));
    }

    #[test]
    fn clip_drops_boxes_outside_region() {
        assert!(BoundingBox::new(120, 0, 10, 10).clip_to(100, 50).is_none());
        assert!(BoundingBox::new(-20, 0, 10, 10).clip_to(100, 50).is_none());
        assert!(BoundingBox::new(0, 0, 0, 10).clip_to(100, 50).is_none());
    }

    #[test]
    fn clipped_boxes_stay_inside_region() {
        let region = (37u32, 23u32);
        for x in -40..60 {
            for w in [-3i64, 0, 1, 5, 80] {
                let bbox = BoundingBox::new(x, x / 2, w, w + 2);
                if let Some(c) = bbox.clip_to(region.0, region.1) {
                    assert!(c.x >= 0 && c.y >= 0);
                    assert!(c.right() <= i64::from(region.0));
                    assert!(c.bottom() <= i64::from(region.1));
                    assert!(!c.is_empty());
                }
            }
        }
    }
}
