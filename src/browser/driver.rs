//! Collaborator contracts the tester drives.
//!
//! The core never talks to a browser directly; it is written against these
//! traits so that the chromium backend, or an in-memory fake in tests, can be
//! injected.

use futures::stream::BoxStream;

use crate::types::ElementRect;
use crate::Result;

/// Per-request lifecycle notification from a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    RequestStarted,
    RequestFinished,
    RequestFailed,
}

/// Subscription to a page's request lifecycle. Dropping it detaches the listeners.
pub type NetworkEventStream = BoxStream<'static, NetworkEvent>;

/// A rendered element on a page.
#[allow(async_fn_in_trait)]
pub trait ElementHandle {
    /// Live geometry in page coordinates, `None` when the element has no box.
    async fn bounding_rect(&self) -> Result<Option<ElementRect>>;

    /// Encoded PNG of just this element.
    async fn screenshot_png(&self) -> Result<Vec<u8>>;
}

/// One open browser page.
#[allow(async_fn_in_trait)]
pub trait PageDriver: Sized {
    type Element: ElementHandle;

    /// Navigates and resolves once the page `load` event fired.
    async fn goto(&self, url: &str) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    async fn focus(&self, selector: &str) -> Result<()>;

    async fn type_text(&self, selector: &str, input: &str) -> Result<()>;

    async fn hover(&self, selector: &str) -> Result<()>;

    async fn set_viewport(&self, width: u32, height: u32, device_scale_factor: f64)
        -> Result<()>;

    /// Height of the rendered document body in CSS pixels.
    async fn content_height(&self) -> Result<u32>;

    async fn query_selector(&self, selector: &str) -> Result<Option<Self::Element>>;

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Self::Element>>;

    /// Encoded PNG of the whole scrollable page.
    async fn screenshot_full_page(&self) -> Result<Vec<u8>>;

    /// Subscribes to request started/finished/failed events.
    async fn network_events(&self) -> Result<NetworkEventStream>;

    async fn close(self) -> Result<()>;
}

/// Something that can open fresh pages.
#[allow(async_fn_in_trait)]
pub trait BrowserDriver {
    type Page: PageDriver;

    async fn new_page(&self) -> Result<Self::Page>;
}

/// Selector matching `mask` descendants of `container`, or `mask` alone.
pub fn scoped_selector(container: Option<&str>, mask: &str) -> String {
    match container.map(str::trim).filter(|c| !c.is_empty()) {
        Some(container) => format!("{} {}", container, mask.trim()),
        None => mask.trim().to_string(),
    }
}
