//! chromiumoxide-backed page and element drivers.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, Viewport as ClipRect,
};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::{stream, StreamExt};

use super::driver::{ElementHandle, NetworkEvent, NetworkEventStream, PageDriver};
use crate::types::ElementRect;
use crate::{Result, VrtError};

pub(crate) fn cdp_error(err: CdpError) -> VrtError {
    VrtError::browser(err.to_string())
}

fn decode_screenshot_data(data: &str) -> Result<Vec<u8>> {
    BASE64_STANDARD
        .decode(data.as_bytes())
        .map_err(|e| VrtError::capture(format!("Screenshot data is not base64: {}", e)))
}

pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    pub(crate) fn new(page: Page) -> Self {
        Self { page }
    }

    /// The underlying chromiumoxide page, for scenario steps beyond the helpers.
    pub fn inner(&self) -> &Page {
        &self.page
    }

    async fn require(&self, selector: &str) -> Result<Element> {
        self.page
            .find_elements(selector)
            .await
            .map_err(cdp_error)?
            .into_iter()
            .next()
            .ok_or_else(|| VrtError::browser(format!("No element matches selector {:?}", selector)))
    }
}

pub struct ChromiumElement {
    element: Element,
}

impl ElementHandle for ChromiumElement {
    async fn bounding_rect(&self) -> Result<Option<ElementRect>> {
        // CDP reports a missing box model (display:none, detached) as an error.
        match self.element.bounding_box().await {
            Ok(bbox) => Ok(Some(ElementRect::new(bbox.x, bbox.y, bbox.width, bbox.height))),
            Err(err) => {
                tracing::debug!(error = %err, "element has no box model");
                Ok(None)
            }
        }
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>> {
        self.element
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(cdp_error)
    }
}

impl PageDriver for ChromiumPage {
    type Element = ChromiumElement;

    async fn goto(&self, url: &str) -> Result<()> {
        self.page.goto(url).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.require(selector).await?.click().await.map_err(cdp_error)?;
        Ok(())
    }

    async fn focus(&self, selector: &str) -> Result<()> {
        self.require(selector).await?.focus().await.map_err(cdp_error)?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, input: &str) -> Result<()> {
        let element = self.require(selector).await?;
        element.focus().await.map_err(cdp_error)?;
        element.type_str(input).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn hover(&self, selector: &str) -> Result<()> {
        self.require(selector).await?.hover().await.map_err(cdp_error)?;
        Ok(())
    }

    async fn set_viewport(
        &self,
        width: u32,
        height: u32,
        device_scale_factor: f64,
    ) -> Result<()> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(width))
            .height(i64::from(height.max(1)))
            .device_scale_factor(device_scale_factor)
            .mobile(false)
            .build()
            .map_err(|e| VrtError::browser(format!("Failed to build viewport params: {}", e)))?;
        self.page.execute(params).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn content_height(&self) -> Result<u32> {
        let height: f64 = self
            .page
            .evaluate("document.body.clientHeight")
            .await
            .map_err(cdp_error)?
            .into_value()
            .map_err(|e| VrtError::browser(format!("Unexpected content height: {}", e)))?;
        Ok(height.max(0.0).ceil() as u32)
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<ChromiumElement>> {
        Ok(self
            .query_selector_all(selector)
            .await?
            .into_iter()
            .next())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ChromiumElement>> {
        let elements = self.page.find_elements(selector).await.map_err(cdp_error)?;
        Ok(elements
            .into_iter()
            .map(|element| ChromiumElement { element })
            .collect())
    }

    /// Captures the whole document under the current device metrics override.
    async fn screenshot_full_page(&self) -> Result<Vec<u8>> {
        // chromiumoxide's full_page mode swaps in its own metrics at scale 1
        // and clears the override afterwards, so drive CDP directly.
        let size: Vec<f64> = self
            .page
            .evaluate(
                "[document.documentElement.scrollWidth, document.documentElement.scrollHeight]",
            )
            .await
            .map_err(cdp_error)?
            .into_value()
            .map_err(|e| VrtError::capture(format!("Unexpected document size: {}", e)))?;
        let (width, height) = match size.as_slice() {
            [width, height] => (*width, *height),
            _ => return Err(VrtError::capture("Unexpected document size")),
        };

        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .capture_beyond_viewport(true)
            .clip(ClipRect {
                x: 0.0,
                y: 0.0,
                width,
                height,
                scale: 1.0,
            })
            .build();
        let response = self.page.execute(params).await.map_err(cdp_error)?;
        decode_screenshot_data(response.result.data.as_ref())
    }

    async fn network_events(&self) -> Result<NetworkEventStream> {
        // A redirect hop arrives as a new requestWillBeSent on the same request;
        // it finishes the previous hop and starts the next one.
        let started = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(cdp_error)?
            .flat_map(|event| {
                let events = if event.redirect_response.is_some() {
                    vec![NetworkEvent::RequestFinished, NetworkEvent::RequestStarted]
                } else {
                    vec![NetworkEvent::RequestStarted]
                };
                stream::iter(events)
            });
        let finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(cdp_error)?
            .map(|_| NetworkEvent::RequestFinished);
        let failed = self
            .page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(cdp_error)?
            .map(|_| NetworkEvent::RequestFailed);

        Ok(stream::select_all(vec![started.boxed(), finished.boxed(), failed.boxed()]).boxed())
    }

    async fn close(self) -> Result<()> {
        self.page.close().await.map_err(cdp_error)
    }
}
