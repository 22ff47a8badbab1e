//! Browser launch options and the chromium session owner.
//!
//! [`BrowserOptions`] is always available so the CLI can resolve it from flags;
//! [`ChromiumBrowser`] needs the `chromium` feature.

use std::path::PathBuf;

/// Configuration options for launching a headless browser.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Chrome/Chromium binary; autodetected when `None`.
    pub chrome_executable: Option<PathBuf>,
    /// Whether to run in headless mode.
    pub headless: bool,
    /// Disable the Chrome sandbox (needed in most containers).
    pub no_sandbox: bool,
    /// Extra command-line switches passed through verbatim.
    pub extra_args: Vec<String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            headless: true,
            no_sandbox: true,
            extra_args: vec!["--hide-scrollbars".to_string()],
        }
    }
}

#[cfg(feature = "chromium")]
pub use chromium_session::ChromiumBrowser;

#[cfg(feature = "chromium")]
mod chromium_session {
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use futures::StreamExt;
    use tokio::task::JoinHandle;

    use super::BrowserOptions;
    use crate::browser::chromium::{cdp_error, ChromiumPage};
    use crate::browser::BrowserDriver;
    use crate::{Result, VrtError};

    /// A launched browser plus the task pumping its CDP event handler.
    pub struct ChromiumBrowser {
        browser: Browser,
        handler: JoinHandle<()>,
    }

    impl ChromiumBrowser {
        pub async fn launch(options: &BrowserOptions) -> Result<Self> {
            let mut builder = BrowserConfig::builder();
            if !options.headless {
                builder = builder.with_head();
            }
            if options.no_sandbox {
                builder = builder.no_sandbox();
            }
            if let Some(path) = &options.chrome_executable {
                builder = builder.chrome_executable(path);
            }
            for arg in &options.extra_args {
                builder = builder.arg(arg.as_str());
            }
            let config = builder
                .build()
                .map_err(|e| VrtError::browser(format!("Invalid chromium config: {}", e)))?;

            tracing::debug!(headless = options.headless, "launching chromium");
            let (browser, mut handler) = Browser::launch(config).await.map_err(cdp_error)?;

            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(err) = event {
                        tracing::debug!(error = %err, "chromium handler event error");
                    }
                }
            });

            Ok(Self { browser, handler })
        }

        pub async fn close(mut self) -> Result<()> {
            self.browser.close().await.map_err(cdp_error)?;
            let _ = self.browser.wait().await;
            self.handler.abort();
            Ok(())
        }
    }

    impl BrowserDriver for ChromiumBrowser {
        type Page = ChromiumPage;

        async fn new_page(&self) -> Result<ChromiumPage> {
            let page = self
                .browser
                .new_page("about:blank")
                .await
                .map_err(cdp_error)?;
            Ok(ChromiumPage::new(page))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_options_default_values() {
        let opts = BrowserOptions::default();
        assert!(opts.chrome_executable.is_none());
        assert!(opts.headless);
        assert!(opts.no_sandbox);
        assert!(opts.extra_args.iter().any(|a| a == "--hide-scrollbars"));
    }
}
