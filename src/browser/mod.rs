//! Browser automation boundary.
//!
//! # Module Structure
//!
//! - `driver` - traits the tester is written against (page, element, events)
//! - `manager` - launch options and the chromium session owner
//! - `chromium` - chromiumoxide page/element drivers (feature `chromium`)
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "chromium")]
//! # async fn example() -> vrt_lib::Result<()> {
//! use vrt_lib::{BrowserOptions, ChromiumBrowser, Config, VisualRegressionTester};
//!
//! let browser = ChromiumBrowser::launch(&BrowserOptions::default()).await?;
//! let tester = VisualRegressionTester::new(browser, Config::default());
//! let regressed = tester
//!     .test("home", Default::default(), |session| {
//!         Box::pin(async move { session.go_to("/").await })
//!     })
//!     .await?;
//! assert!(!regressed);
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "chromium")]
mod chromium;
mod driver;
mod manager;

pub use driver::{
    scoped_selector, BrowserDriver, ElementHandle, NetworkEvent, NetworkEventStream, PageDriver,
};
#[cfg(feature = "chromium")]
pub use chromium::{ChromiumElement, ChromiumPage};
pub use manager::BrowserOptions;
#[cfg(feature = "chromium")]
pub use manager::ChromiumBrowser;
