//! Snapshot capture: screenshot, decode, mask.

use image::RgbaImage;

use crate::browser::{ElementHandle, PageDriver};
use crate::mask::{plan_masks, MaskOptions};
use crate::{Result, VrtError};

/// What to capture from a page.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureRequest<'a> {
    /// Capture only this element; the whole scrollable page when `None`.
    pub element_selector: Option<&'a str>,
    pub mask_selectors: &'a [String],
    pub mask: MaskOptions,
}

/// Screenshots the requested region and returns it decoded, with masks painted.
///
/// Mask geometry is read before the screenshot, while the page still has the
/// viewport the capture is taken at.
pub async fn capture_snapshot<P: PageDriver>(
    page: &P,
    request: &CaptureRequest<'_>,
) -> Result<RgbaImage> {
    let plan = if request.mask_selectors.is_empty() {
        None
    } else {
        Some(
            plan_masks(
                page,
                request.element_selector,
                request.mask_selectors,
                request.mask.margin,
            )
            .await?,
        )
    };

    let encoded = match request.element_selector {
        Some(selector) => {
            let element = page.query_selector(selector).await?.ok_or_else(|| {
                VrtError::capture(format!("No element matches selector {:?}", selector))
            })?;
            element.screenshot_png().await?
        }
        None => page.screenshot_full_page().await?,
    };

    let image = decode_png(&encoded)?;
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        element = request.element_selector.unwrap_or("<page>"),
        "captured snapshot"
    );

    Ok(match plan {
        Some(plan) => plan.paint(&image, request.mask.device_scale_factor),
        None => image,
    })
}

pub fn decode_png(bytes: &[u8]) -> Result<RgbaImage> {
    if bytes.is_empty() {
        return Err(VrtError::capture("Browser returned an empty screenshot"));
    }
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}
