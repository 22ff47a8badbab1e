//! Bounding-box resolution and mask compositing.
//!
//! Geometry is read live from the page into a [`MaskPlan`] before the
//! capture is taken. Boxes arrive in CSS pixels relative to the page, get
//! moved into the captured region's frame, scaled to device pixels, clipped,
//! and painted on a copy of the capture.

use image::{Rgba, RgbaImage};

use crate::browser::{scoped_selector, ElementHandle, PageDriver};
use crate::types::{BoundingBox, ElementRect};
use crate::{Result, VrtError};

/// Sentinel fill for masked regions (`#FF00FF`, opaque).
pub const MASK_COLOR: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Boxes produced for one compositing pass, in paint order.
pub type MaskRegion = Vec<BoundingBox>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskOptions {
    /// Outer margin in CSS pixels added around every mask.
    pub margin: u32,
    pub device_scale_factor: f64,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self {
            margin: crate::config::DEFAULT_MASK_MARGIN,
            device_scale_factor: 1.0,
        }
    }
}

/// Live rect of `element` in CSS pixels, grown by `margin`.
///
/// `None` when the element is not rendered or has no area of its own, so an
/// invisible element never turns into a margin-sized mask.
pub async fn resolve_mask_rect<E: ElementHandle>(
    element: &E,
    margin: u32,
) -> Result<Option<ElementRect>> {
    let Some(rect) = element.bounding_rect().await? else {
        return Ok(None);
    };
    if !(rect.width > 0.0 && rect.height > 0.0) {
        return Ok(None);
    }
    Ok(Some(rect.expand(f64::from(margin))))
}

/// Live box of `element`, grown by `margin` and rounded outward.
pub async fn resolve_bounding_box<E: ElementHandle>(
    element: &E,
    margin: u32,
) -> Result<Option<BoundingBox>> {
    Ok(resolve_mask_rect(element, margin)
        .await?
        .map(|rect| BoundingBox::enclosing(&rect)))
}

/// Resolves every element matched by `mask_selectors` under `container`.
pub async fn collect_mask_rects<P: PageDriver>(
    page: &P,
    container: Option<&str>,
    mask_selectors: &[String],
    margin: u32,
) -> Result<Vec<ElementRect>> {
    let mut rects = Vec::new();
    for mask in mask_selectors {
        let selector = scoped_selector(container, mask);
        let elements = page.query_selector_all(&selector).await?;
        let matched = elements.len();
        for element in &elements {
            if let Some(rect) = resolve_mask_rect(element, margin).await? {
                rects.push(rect);
            }
        }
        tracing::debug!(%selector, matched, "mask selector resolved");
    }
    Ok(rects)
}

/// Moves page-space rects into the frame of a captured region.
///
/// `origin` is the region's top-left in CSS pixels, unrounded, matching where
/// the screenshot clip starts. The result is in device pixels, rounded
/// outward and clipped to `[0, width) x [0, height)`. Boxes left without
/// area are dropped.
pub fn clip_mask_boxes(
    rects: &[ElementRect],
    origin: (f64, f64),
    device_scale_factor: f64,
    width: u32,
    height: u32,
) -> MaskRegion {
    rects
        .iter()
        .filter_map(|rect| {
            let device = rect
                .translate(-origin.0, -origin.1)
                .scale(device_scale_factor);
            BoundingBox::enclosing(&device).clip_to(width, height)
        })
        .collect()
}

/// Paints `boxes` onto a copy of `image`.
///
/// Boxes must already be clipped to the image; the source is left untouched.
pub fn paint_masks(image: &RgbaImage, boxes: &[BoundingBox]) -> RgbaImage {
    let mut masked = image.clone();
    for bbox in boxes {
        let Some(bbox) = bbox.clip_to(masked.width(), masked.height()) else {
            continue;
        };
        for y in bbox.y..bbox.bottom() {
            for x in bbox.x..bbox.right() {
                masked.put_pixel(x as u32, y as u32, MASK_COLOR);
            }
        }
    }
    masked
}

/// Mask geometry read from the page, to be painted on a capture taken
/// under the same layout.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskPlan {
    /// Captured element's rect; `None` when the whole page is captured.
    region: Option<ElementRect>,
    rects: Vec<ElementRect>,
}

impl MaskPlan {
    pub fn new(region: Option<ElementRect>, rects: Vec<ElementRect>) -> Self {
        Self { region, rects }
    }

    pub fn rects(&self) -> &[ElementRect] {
        &self.rects
    }

    /// Paints the planned masks on a copy of `image`, a capture of the
    /// planned region at `device_scale_factor`.
    pub fn paint(&self, image: &RgbaImage, device_scale_factor: f64) -> RgbaImage {
        let (origin, width, height) = match self.region {
            Some(region) => {
                let scaled = region.scale(device_scale_factor);
                (
                    (region.x, region.y),
                    clamp_extent(scaled.width, image.width()),
                    clamp_extent(scaled.height, image.height()),
                )
            }
            None => ((0.0, 0.0), image.width(), image.height()),
        };
        let boxes = clip_mask_boxes(&self.rects, origin, device_scale_factor, width, height);
        tracing::debug!(
            resolved = self.rects.len(),
            painted = boxes.len(),
            "applying masks"
        );
        paint_masks(image, &boxes)
    }
}

/// Reads the container and mask geometry from the live page.
pub async fn plan_masks<P: PageDriver>(
    page: &P,
    container: Option<&str>,
    mask_selectors: &[String],
    margin: u32,
) -> Result<MaskPlan> {
    let region = match container {
        Some(selector) => Some(container_rect(page, selector).await?),
        None => None,
    };
    let rects = collect_mask_rects(page, container, mask_selectors, margin).await?;
    Ok(MaskPlan::new(region, rects))
}

async fn container_rect<P: PageDriver>(page: &P, selector: &str) -> Result<ElementRect> {
    let element = page
        .query_selector(selector)
        .await?
        .ok_or_else(|| VrtError::capture(format!("No element matches selector {:?}", selector)))?;
    element.bounding_rect().await?.ok_or_else(|| {
        VrtError::capture(format!("Element {:?} has no rendered box", selector))
    })
}

fn clamp_extent(extent: f64, limit: u32) -> u32 {
    extent.ceil().clamp(0.0, f64::from(limit)) as u32
}
