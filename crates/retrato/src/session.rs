//! Capture orchestration over one browser session.
//!
//! A [`CaptureSession`] owns a driver and a compare engine, resolves the
//! browser identity once, and sequences every save/check operation: refresh
//! browser metrics, resolve geometry where needed, capture (or stitch),
//! then persist or delegate to the external comparator. All awaits within
//! one operation run in strict program order; the underlying automation
//! protocol serializes commands per session.

use crate::capabilities::{CaptureStrategy, Identity};
use crate::compare::{overlay_overrides, CompareEngine, CompareOutcome, CompareRequest};
use crate::driver::{decode_screenshot, ElementHandle, PageDriver};
use crate::geometry::{GeometryResolver, MobileOffsets, Rectangle};
use crate::name_format::ImageNameFormat;
use crate::result::{RetratoError, RetratoResult};
use crate::scripts;
use crate::stitch::{PageStitcher, DEFAULT_SETTLE_DELAY};
use crate::storage::BaselineStore;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Session construction options.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    base_path: Option<PathBuf>,
    diff_path: Option<PathBuf>,
    baseline: bool,
    width: Option<u32>,
    height: Option<u32>,
    format: ImageNameFormat,
    offsets: MobileOffsets,
    settle_delay: Option<Duration>,
}

impl SessionConfig {
    /// Create an empty configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the baseline image directory (required)
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Set the difference image directory (required)
    #[must_use]
    pub fn with_diff_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.diff_path = Some(path.into());
        self
    }

    /// Save a new baseline when a check finds none (the check still fails)
    #[must_use]
    pub const fn with_baseline(mut self, baseline: bool) -> Self {
        self.baseline = baseline;
        self
    }

    /// Request an explicit browser window size at session start
    #[must_use]
    pub const fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Replace the image name format
    #[must_use]
    pub fn with_name_format(mut self, format: ImageNameFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the image name template
    #[must_use]
    pub fn with_format_template(mut self, template: impl Into<String>) -> Self {
        self.format = self.format.with_template(template);
        self
    }

    /// Add a custom image name template variable
    #[must_use]
    pub fn with_format_variable(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.format = self.format.with_variable(key, value);
        self
    }

    /// Override the mobile OS-chrome offsets
    #[must_use]
    pub const fn with_offsets(mut self, offsets: MobileOffsets) -> Self {
        self.offsets = offsets;
        self
    }

    /// Set the settle delay between scroll steps during page stitching
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = Some(delay);
        self
    }
}

/// Caller-supplied compare options for check operations.
///
/// Keys ride through to the external engine unchanged; on collision with a
/// built-in default the caller value wins.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    overrides: BTreeMap<String, Value>,
}

impl CheckOptions {
    /// Create an empty option set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an engine option
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }
}

/// Per-call browser metrics in physical pixels.
///
/// Recomputed at the start of every operation and never cached: window size
/// and scroll position change between tests. Immutable once built; the page
/// variants derive a copy with the full-page dimensions instead of mutating
/// session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureContext {
    /// Device pixel ratio, integral, minimum 1
    pub dpr: u32,
    /// Capture width (screen for mobile, outer window for desktop)
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Viewport height
    pub inner_height: u32,
    /// Full scrollable document width
    pub page_width: u32,
    /// Full scrollable document height
    pub page_height: u32,
}

impl CaptureContext {
    /// A copy whose width/height are the full-page dimensions
    #[must_use]
    pub const fn with_page_dimensions(self) -> Self {
        Self {
            width: self.page_width,
            height: self.page_height,
            ..self
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetrics {
    pixel_ratio: f64,
    width: f64,
    height: f64,
    inner_height: f64,
    page_width: f64,
    page_height: f64,
}

/// Orchestrates screenshot capture, baseline persistence and comparison.
#[derive(Debug)]
pub struct CaptureSession<D, E> {
    driver: D,
    engine: E,
    identity: Identity,
    store: BaselineStore,
    format: ImageNameFormat,
    resolver: GeometryResolver,
    stitcher: PageStitcher,
    baseline: bool,
}

impl<D: PageDriver, E: CompareEngine> CaptureSession<D, E> {
    /// Initialize a session: validate configuration, create the image
    /// directories, resolve the browser identity once and apply an explicit
    /// window size when configured.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a required path is missing or the
    /// automation layer reports no browser name; I/O errors from directory
    /// creation and driver failures propagate.
    pub async fn initialize(config: SessionConfig, driver: D, engine: E) -> RetratoResult<Self> {
        let base_path = config.base_path.ok_or_else(|| RetratoError::Config {
            message: "image baseline path not given".to_string(),
        })?;
        let diff_path = config.diff_path.ok_or_else(|| RetratoError::Config {
            message: "image difference path not given".to_string(),
        })?;

        let store = BaselineStore::open(base_path, diff_path)?;

        let caps = driver.capabilities().await?;
        let identity = Identity::resolve(&caps)?;
        register_matchers(&identity.framework);

        if let (Some(width), Some(height)) = (config.width, config.height) {
            driver.set_window_size(width, height).await?;
        }

        let stitcher =
            PageStitcher::new().with_settle_delay(config.settle_delay.unwrap_or(DEFAULT_SETTLE_DELAY));

        Ok(Self {
            driver,
            engine,
            identity,
            store,
            format: config.format,
            resolver: GeometryResolver::new(config.offsets),
            stitcher,
            baseline: config.baseline,
        })
    }

    /// The resolved, frozen session identity
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Whether missing baselines are bootstrapped on check
    #[must_use]
    pub const fn baseline_enabled(&self) -> bool {
        self.baseline
    }

    /// Save a screenshot of the visible screen as a baseline image.
    ///
    /// Has no baseline-existence precondition; an existing image for the
    /// same name is replaced.
    pub async fn save_screen(&self, tag: &str) -> RetratoResult<()> {
        let ctx = self.browser_metrics().await?;
        let name = self.image_name(tag, &ctx);
        debug!(tag, name = %name, "saving screen image");

        let png = self.take_screenshot_bytes().await?;
        self.store.write_baseline(&name, &png, None)?;
        Ok(())
    }

    /// Save an element's region of the screen as a baseline image.
    ///
    /// # Errors
    ///
    /// Element lookup failures and out-of-bounds crop rectangles propagate.
    pub async fn save_region(&self, element: &ElementHandle, tag: &str) -> RetratoResult<()> {
        let ctx = self.browser_metrics().await?;
        let rect = self
            .resolver
            .resolve(&self.driver, element, &self.identity, ctx.dpr)
            .await?;
        let name = self.image_name(tag, &ctx);
        debug!(tag, name = %name, ?rect, "saving region image");

        let png = self.take_screenshot_bytes().await?;
        self.store.write_baseline(&name, &png, Some(rect))?;
        Ok(())
    }

    /// Save the full scrollable page as a baseline image.
    ///
    /// Browsers that raster the whole document natively take the plain
    /// screen path; everything else is stitched from scroll steps. The
    /// stitched image is named with the full page dimensions, not the
    /// viewport's.
    pub async fn save_page(&self, tag: &str) -> RetratoResult<()> {
        self.save_page_with(&self.stitcher, tag).await
    }

    /// Save the full page with an explicit scroll settle delay for this call
    pub async fn save_page_with_delay(
        &self,
        tag: &str,
        settle_delay: Duration,
    ) -> RetratoResult<()> {
        let stitcher = self.stitcher.clone().with_settle_delay(settle_delay);
        self.save_page_with(&stitcher, tag).await
    }

    async fn save_page_with(&self, stitcher: &PageStitcher, tag: &str) -> RetratoResult<()> {
        let ctx = self.browser_metrics().await?;

        if self.identity.strategy() == CaptureStrategy::PageCapture {
            let name = self.image_name(tag, &ctx);
            debug!(tag, name = %name, "saving natively captured page image");
            let png = self.take_screenshot_bytes().await?;
            self.store.write_baseline(&name, &png, None)?;
            return Ok(());
        }

        let page_ctx = ctx.with_page_dimensions();
        let name = self.image_name(tag, &page_ctx);
        debug!(tag, name = %name, "saving stitched page image");

        let composed = stitcher
            .capture(&self.driver, ctx.inner_height, ctx.page_height, ctx.dpr)
            .await?;
        self.store.write_baseline(&name, &composed.png, None)?;
        Ok(())
    }

    /// Compare the visible screen against its baseline image.
    ///
    /// # Errors
    ///
    /// With no baseline present the call fails: with `baseline` enabled the
    /// current capture is first saved as the new baseline and the error says
    /// so; otherwise nothing is written.
    pub async fn check_screen(
        &self,
        tag: &str,
        options: CheckOptions,
    ) -> RetratoResult<CompareOutcome> {
        let ctx = self.browser_metrics().await?;
        let name = self.image_name(tag, &ctx);

        if !self.store.baseline_exists(&name) {
            self.bootstrap_baseline(&name, self.save_screen(tag)).await?;
        }

        let png = self.take_screenshot_bytes().await?;
        self.run_compare(&name, png, None, options)
    }

    /// Compare an element's region against its baseline image.
    pub async fn check_region(
        &self,
        element: &ElementHandle,
        tag: &str,
        options: CheckOptions,
    ) -> RetratoResult<CompareOutcome> {
        let ctx = self.browser_metrics().await?;
        let name = self.image_name(tag, &ctx);

        if !self.store.baseline_exists(&name) {
            self.bootstrap_baseline(&name, self.save_region(element, tag))
                .await?;
        }

        let rect = self
            .resolver
            .resolve(&self.driver, element, &self.identity, ctx.dpr)
            .await?;
        let png = self.take_screenshot_bytes().await?;
        self.run_compare(&name, png, Some(rect), options)
    }

    /// Compare the full scrollable page against its baseline image.
    pub async fn check_page(
        &self,
        tag: &str,
        options: CheckOptions,
    ) -> RetratoResult<CompareOutcome> {
        let ctx = self.browser_metrics().await?;
        let native = self.identity.strategy() == CaptureStrategy::PageCapture;
        let name_ctx = if native {
            ctx
        } else {
            ctx.with_page_dimensions()
        };
        let name = self.image_name(tag, &name_ctx);

        if !self.store.baseline_exists(&name) {
            self.bootstrap_baseline(&name, self.save_page(tag)).await?;
        }

        let candidate = if native {
            self.take_screenshot_bytes().await?
        } else {
            self.stitcher
                .capture(&self.driver, ctx.inner_height, ctx.page_height, ctx.dpr)
                .await?
                .png
        };
        self.run_compare(&name, candidate, None, options)
    }

    /// Missing-baseline policy: with `baseline` enabled, run the
    /// corresponding save operation and fail the check with a
    /// saved-as-new-baseline error; otherwise fail without writing.
    async fn bootstrap_baseline(
        &self,
        name: &str,
        save: impl std::future::Future<Output = RetratoResult<()>> + Send,
    ) -> RetratoResult<()> {
        let path = self.store.baseline_path(name).display().to_string();
        if !self.baseline {
            return Err(RetratoError::BaselineNotFound { path });
        }
        save.await?;
        debug!(name, "baseline missing, saved current capture; check fails");
        Err(RetratoError::BaselineCreated { path })
    }

    fn run_compare(
        &self,
        name: &str,
        candidate: Vec<u8>,
        crop: Option<Rectangle>,
        options: CheckOptions,
    ) -> RetratoResult<CompareOutcome> {
        let mut defaults = BTreeMap::new();
        defaults.insert(
            "outputPolicy".to_string(),
            Value::String("different".to_string()),
        );
        let merged = overlay_overrides(defaults, &options.overrides);

        let request = CompareRequest {
            baseline_path: self.store.baseline_path(name),
            candidate,
            output_path: self.store.diff_output_path(name),
            crop,
            options: merged,
        };
        debug!(name, crop = ?request.crop, "running comparison");
        self.engine.compare(&request)
    }

    /// Refresh the per-call browser metrics.
    async fn browser_metrics(&self) -> RetratoResult<CaptureContext> {
        let value = self
            .driver
            .execute_script(
                scripts::BROWSER_METRICS,
                vec![Value::Bool(self.identity.is_mobile())],
            )
            .await?;
        let raw: RawMetrics = serde_json::from_value(value)?;

        // Firefox rasters in logical pixels; everyone else reports the real
        // ratio, normalized to an integer with a floor of 1.
        let dpr = if self.identity.is_firefox() {
            1
        } else {
            raw.pixel_ratio.round().max(1.0) as u32
        };

        Ok(CaptureContext {
            dpr,
            width: (raw.width as u32) * dpr,
            height: (raw.height as u32) * dpr,
            inner_height: (raw.inner_height as u32) * dpr,
            page_width: (raw.page_width as u32) * dpr,
            page_height: (raw.page_height as u32) * dpr,
        })
    }

    fn image_name(&self, tag: &str, ctx: &CaptureContext) -> String {
        self.format
            .format(tag, &self.identity, ctx.width, ctx.height, ctx.dpr)
    }

    async fn take_screenshot_bytes(&self) -> RetratoResult<Vec<u8>> {
        let payload = self.driver.take_screenshot().await?;
        decode_screenshot(&payload)
    }
}

/// Framework matcher hook: registration is the consuming runner's concern;
/// the `custom` framework (and an unset one) is a guaranteed no-op.
fn register_matchers(framework: &str) {
    if framework.is_empty() || framework == "custom" {
        return;
    }
    debug!(
        framework,
        "assertion matcher registration delegated to the test runner"
    );
}
