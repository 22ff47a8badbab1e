//! Test orchestration across viewports.
//!
//! For each configured viewport a fresh page is opened, the caller's scenario
//! runs against a [`Session`], the page is resized to its content and
//! captured, and the capture is either compared with the stored fixture or
//! recorded as the new one.

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use futures::{stream, StreamExt};

use crate::browser::{BrowserDriver, PageDriver};
use crate::capture::{capture_snapshot, CaptureRequest};
use crate::config::{
    resolve_settings, Config, EffectiveSettings, SettingsLayer, WaitUntil,
    LOAD_SETTLED_QUIET_PERIOD,
};
use crate::diff::{diff_images, DiffOptions};
use crate::fixtures::{load_image, save_image, SnapshotPaths};
use crate::mask::MaskOptions;
use crate::network_idle::NetworkIdle;
use crate::types::{TestOutcome, ViewportReport, ViewportStatus};
use crate::viewport::Viewport;
use crate::{Result, VrtError};

pub type ProgressCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-test options.
#[derive(Debug, Clone, Default)]
pub struct TestOptions {
    /// Capture only this element instead of the whole page.
    pub element_selector: Option<String>,
    /// Regions painted over before comparing, scoped under `element_selector`.
    pub mask_selectors: Vec<String>,
    /// Distinguishes result files of several tests sharing one fixture.
    pub regression_suffix: Option<String>,
    /// Test-level overrides; they win over the tester's config.
    pub settings: SettingsLayer,
}

impl TestOptions {
    pub fn element(mut self, selector: impl Into<String>) -> Self {
        self.element_selector = Some(selector.into());
        self
    }

    pub fn mask(mut self, selector: impl Into<String>) -> Self {
        self.mask_selectors.push(selector.into());
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.regression_suffix = Some(suffix.into());
        self
    }

    pub fn settings(mut self, settings: SettingsLayer) -> Self {
        self.settings = settings;
        self
    }
}

/// A page handed to a scenario, with idle-gated interaction helpers.
pub struct Session<P> {
    page: P,
    base_url: String,
    wait_until: WaitUntil,
    navigation_timeout: Duration,
    test_settings: SettingsLayer,
    tester_settings: SettingsLayer,
}

impl<P: PageDriver> Session<P> {
    pub fn page(&self) -> &P {
        &self.page
    }

    fn into_page(self) -> P {
        self.page
    }

    /// Settings for one call, layered over the test and tester levels.
    pub fn settings(&self, call: &SettingsLayer) -> EffectiveSettings {
        resolve_settings(call, &self.test_settings, &self.tester_settings)
    }

    async fn idle_waiter(&self, call: &SettingsLayer) -> Result<NetworkIdle> {
        let settings = self.settings(call);
        NetworkIdle::subscribe(&self.page, settings.quiet_period, settings.max_inflight_requests)
            .await
    }

    /// Navigates to `{base_url}{path}`.
    ///
    /// Completes once the load-settled signal fired within the navigation
    /// timeout and the page went idle.
    pub async fn go_to(&self, path: &str) -> Result<()> {
        self.go_to_with(path, &SettingsLayer::default()).await
    }

    /// [`go_to`](Self::go_to) with call-level idle overrides.
    pub async fn go_to_with(&self, path: &str, call: &SettingsLayer) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, wait_until = ?self.wait_until, "navigating");

        let idle = self.idle_waiter(call).await?;
        let settled = match self.wait_until.idle_threshold() {
            Some(max_inflight) => Some(
                NetworkIdle::subscribe(&self.page, LOAD_SETTLED_QUIET_PERIOD, max_inflight).await?,
            ),
            None => None,
        };

        let navigation = async {
            match settled {
                Some(settled) => {
                    tokio::try_join!(self.page.goto(&url), settled.wait())?;
                }
                None => self.page.goto(&url).await?,
            }
            Ok::<(), VrtError>(())
        };
        let bounded = async {
            tokio::time::timeout(self.navigation_timeout, navigation)
                .await
                .map_err(|_| {
                    VrtError::browser(format!(
                        "Navigation to {} timed out after {:?}",
                        url, self.navigation_timeout
                    ))
                })?
        };

        tokio::try_join!(bounded, idle.wait())?;
        Ok(())
    }

    pub async fn click(&self, selector: &str) -> Result<()> {
        self.click_with(selector, &SettingsLayer::default()).await
    }

    pub async fn click_with(&self, selector: &str, call: &SettingsLayer) -> Result<()> {
        let idle = self.idle_waiter(call).await?;
        tokio::try_join!(self.page.click(selector), idle.wait())?;
        Ok(())
    }

    pub async fn focus(&self, selector: &str) -> Result<()> {
        self.focus_with(selector, &SettingsLayer::default()).await
    }

    pub async fn focus_with(&self, selector: &str, call: &SettingsLayer) -> Result<()> {
        let idle = self.idle_waiter(call).await?;
        tokio::try_join!(self.page.focus(selector), idle.wait())?;
        Ok(())
    }

    pub async fn type_text(&self, selector: &str, input: &str) -> Result<()> {
        self.type_text_with(selector, input, &SettingsLayer::default())
            .await
    }

    pub async fn type_text_with(
        &self,
        selector: &str,
        input: &str,
        call: &SettingsLayer,
    ) -> Result<()> {
        let idle = self.idle_waiter(call).await?;
        tokio::try_join!(self.page.type_text(selector, input), idle.wait())?;
        Ok(())
    }

    pub async fn hover(&self, selector: &str) -> Result<()> {
        self.hover_with(selector, &SettingsLayer::default()).await
    }

    pub async fn hover_with(&self, selector: &str, call: &SettingsLayer) -> Result<()> {
        let idle = self.idle_waiter(call).await?;
        tokio::try_join!(self.page.hover(selector), idle.wait())?;
        Ok(())
    }

    /// Waits until the page is idle under the session's settings.
    pub async fn wait_for_idle(&self) -> Result<()> {
        self.wait_for_idle_with(&SettingsLayer::default()).await
    }

    /// Waits until idle with call-level overrides for quiet period and threshold.
    pub async fn wait_for_idle_with(&self, call: &SettingsLayer) -> Result<()> {
        let settings = self.settings(call);
        NetworkIdle::subscribe(&self.page, settings.quiet_period, settings.max_inflight_requests)
            .await?
            .wait()
            .await
    }
}

/// Runs snapshot tests against a browser across the configured viewports.
pub struct VisualRegressionTester<B> {
    browser: B,
    config: Config,
    progress: Option<ProgressCallback>,
}

impl<B: BrowserDriver> VisualRegressionTester<B> {
    pub fn new(browser: B, config: Config) -> Self {
        Self {
            browser,
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn into_browser(self) -> B {
        self.browser
    }

    fn report(&self, message: &str) {
        if let Some(progress) = &self.progress {
            progress(message);
        }
    }

    /// Runs `scenario` at every viewport; `true` when any viewport regressed.
    pub async fn test<F>(&self, snapshot_id: &str, options: TestOptions, scenario: F) -> Result<bool>
    where
        F: for<'a> Fn(&'a Session<B::Page>) -> LocalBoxFuture<'a, Result<()>>,
    {
        Ok(self
            .test_outcome(snapshot_id, options, scenario)
            .await?
            .has_regressions())
    }

    /// Like [`test`](Self::test), with the per-viewport breakdown.
    ///
    /// Invalid test-level settings are rejected before any page opens. A
    /// scenario error aborts the remaining viewports and is returned as is.
    pub async fn test_outcome<F>(
        &self,
        snapshot_id: &str,
        options: TestOptions,
        scenario: F,
    ) -> Result<TestOutcome>
    where
        F: for<'a> Fn(&'a Session<B::Page>) -> LocalBoxFuture<'a, Result<()>>,
    {
        resolve_settings(&SettingsLayer::default(), &options.settings, &self.config.settings)
            .validate()?;

        let options = &options;
        let scenario = &scenario;
        let aborted = Cell::new(false);
        let aborted = &aborted;
        let iterations = self
            .config
            .viewports
            .iter()
            .copied()
            .enumerate()
            .map(move |(index, viewport)| async move {
                if aborted.get() {
                    return Ok(None);
                }
                self.run_viewport(snapshot_id, viewport, options, scenario)
                    .await
                    .map(|report| Some((index, report)))
            });

        // Once a viewport fails no new page is opened, but pages already in
        // flight run to completion so each one gets closed.
        let mut reports = Vec::with_capacity(self.config.viewports.len());
        let mut first_error = None;
        let mut pending = stream::iter(iterations).buffer_unordered(self.config.page_limit());
        while let Some(result) = pending.next().await {
            match result {
                Ok(Some(entry)) => reports.push(entry),
                Ok(None) => {}
                Err(err) if first_error.is_none() => {
                    tracing::debug!(
                        snapshot_id,
                        completed = reports.len(),
                        "aborting remaining viewports"
                    );
                    aborted.set(true);
                    first_error = Some(err);
                }
                Err(err) => tracing::debug!(snapshot_id, error = %err, "viewport failed after abort"),
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }
        reports.sort_by_key(|(index, _)| *index);

        let mut outcome = TestOutcome::new(snapshot_id);
        outcome.viewports = reports.into_iter().map(|(_, report)| report).collect();

        let failing = outcome.failing_viewports();
        if self.config.viewports.len() > 1 && !failing.is_empty() {
            let listed: Vec<String> = failing.iter().map(Viewport::to_string).collect();
            tracing::warn!("{}: regression at viewports {}", snapshot_id, listed.join(", "));
        }
        Ok(outcome)
    }

    async fn run_viewport<F>(
        &self,
        snapshot_id: &str,
        viewport: Viewport,
        options: &TestOptions,
        scenario: &F,
    ) -> Result<ViewportReport>
    where
        F: for<'a> Fn(&'a Session<B::Page>) -> LocalBoxFuture<'a, Result<()>>,
    {
        let paths = SnapshotPaths::new(
            &self.config.fixtures_dir,
            &self.config.results_dir,
            snapshot_id,
            &viewport,
            options.regression_suffix.as_deref(),
        );
        paths.clean_results()?;

        let scale = self.config.scale_for(&viewport);
        let page = self.browser.new_page().await?;
        let session = Session {
            page,
            base_url: self.config.base_url.clone(),
            wait_until: self.config.wait_until,
            navigation_timeout: self.config.timeouts.navigation,
            test_settings: options.settings,
            tester_settings: self.config.settings,
        };

        let result = self
            .exercise(&session, viewport, scale, &paths, options, scenario)
            .await;
        let closed = session.into_page().close().await;
        let report = result?;
        closed?;
        Ok(report)
    }

    async fn exercise<F>(
        &self,
        session: &Session<B::Page>,
        viewport: Viewport,
        scale: f64,
        paths: &SnapshotPaths,
        options: &TestOptions,
        scenario: &F,
    ) -> Result<ViewportReport>
    where
        F: for<'a> Fn(&'a Session<B::Page>) -> LocalBoxFuture<'a, Result<()>>,
    {
        let page = session.page();
        page.set_viewport(
            viewport.width,
            self.config.mode.initial_height(viewport.width),
            scale,
        )
        .await?;

        scenario(session).await?;

        let height = page.content_height().await?;
        page.set_viewport(viewport.width, height, scale).await?;

        let settings = session.settings(&SettingsLayer::default());
        let request = CaptureRequest {
            element_selector: options.element_selector.as_deref(),
            mask_selectors: &options.mask_selectors,
            mask: MaskOptions {
                margin: settings.mask_margin,
                device_scale_factor: scale,
            },
        };
        let candidate = capture_snapshot(page, &request).await?;

        if !paths.has_reference() {
            save_image(&candidate, &paths.reference)?;
            tracing::info!(path = %paths.reference.display(), "recorded fixture");
            self.report(&format!("Recorded fixture {}", paths.reference.display()));
            return Ok(ViewportReport {
                viewport,
                status: ViewportStatus::Recorded,
                differing_fraction: 0.0,
            });
        }

        let fixture = load_image(&paths.reference)?;
        let diff = diff_images(&fixture, &candidate, &DiffOptions::with_tolerance(settings.tolerance));
        let status = if diff.is_regression() {
            save_image(&candidate, &paths.candidate)?;
            if let Some(diff_image) = &diff.diff_image {
                save_image(diff_image, &paths.diff)?;
            }
            self.report(&format!(
                "Viewport {} differs by {:.4}% (see {})",
                viewport,
                diff.differing_fraction * 100.0,
                paths.diff.display()
            ));
            ViewportStatus::Regressed
        } else {
            self.report(&format!("Viewport {} matches fixture", viewport));
            ViewportStatus::Passed
        };
        tracing::info!(
            %viewport,
            ?status,
            differing_fraction = diff.differing_fraction,
            "compared snapshot"
        );

        Ok(ViewportReport {
            viewport,
            status,
            differing_fraction: diff.differing_fraction,
        })
    }
}
