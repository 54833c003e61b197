//! Abstract browser-automation surface.
//!
//! The orchestrator talks to the browser through the [`PageDriver`] trait so
//! implementations can be swapped: the CDP adapter (feature `browser`), a
//! WebDriver bridge, or the scripted [`MockDriver`] for unit tests.
//! Screenshots cross the boundary as base64 PNG payloads, matching what
//! WebDriver-style endpoints return.

use crate::capabilities::SessionCapabilities;
use crate::result::{RetratoError, RetratoResult};
use crate::scripts;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Handle to a page element, addressed by CSS selector.
///
/// The selector is the only thing shipped across the page boundary; scripts
/// re-resolve it inside the browser context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    selector: String,
}

impl ElementHandle {
    /// Create a handle from a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    /// The CSS selector backing this handle
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }
}

impl std::fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.selector)
    }
}

/// Browser-automation capability surface consumed by the orchestrator.
///
/// All commands against one session are serialized by the protocol; callers
/// must not issue concurrent calls on the same driver.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// The session's capability descriptor
    async fn capabilities(&self) -> RetratoResult<SessionCapabilities>;

    /// Capture a screenshot, returned as a base64 PNG payload
    async fn take_screenshot(&self) -> RetratoResult<String>;

    /// Execute a self-contained page-side function with serializable args
    async fn execute_script(&self, script: &str, args: Vec<Value>) -> RetratoResult<Value>;

    /// Element location relative to the top of the full document, CSS pixels
    async fn element_location(&self, element: &ElementHandle) -> RetratoResult<(f64, f64)>;

    /// Element size in CSS pixels
    async fn element_size(&self, element: &ElementHandle) -> RetratoResult<(f64, f64)>;

    /// Resize the browser window
    async fn set_window_size(&self, width: u32, height: u32) -> RetratoResult<()>;

    /// Scroll the page to a vertical offset, CSS pixels
    async fn scroll_to(&self, y: f64) -> RetratoResult<()>;
}

#[async_trait]
impl<D: PageDriver + ?Sized> PageDriver for Arc<D> {
    async fn capabilities(&self) -> RetratoResult<SessionCapabilities> {
        (**self).capabilities().await
    }

    async fn take_screenshot(&self) -> RetratoResult<String> {
        (**self).take_screenshot().await
    }

    async fn execute_script(&self, script: &str, args: Vec<Value>) -> RetratoResult<Value> {
        (**self).execute_script(script, args).await
    }

    async fn element_location(&self, element: &ElementHandle) -> RetratoResult<(f64, f64)> {
        (**self).element_location(element).await
    }

    async fn element_size(&self, element: &ElementHandle) -> RetratoResult<(f64, f64)> {
        (**self).element_size(element).await
    }

    async fn set_window_size(&self, width: u32, height: u32) -> RetratoResult<()> {
        (**self).set_window_size(width, height).await
    }

    async fn scroll_to(&self, y: f64) -> RetratoResult<()> {
        (**self).scroll_to(y).await
    }
}

/// Decode a base64 screenshot payload into PNG bytes.
///
/// # Errors
///
/// Returns a screenshot error when the payload is not valid base64.
pub fn decode_screenshot(payload: &str) -> RetratoResult<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| RetratoError::Screenshot {
            message: format!("invalid base64 screenshot payload: {e}"),
        })
}

/// Scripted driver for unit testing.
///
/// Emulates the page-side probes from [`crate::scripts`] against configured
/// screen geometry and element rectangles, serves queued screenshots, and
/// records every call for verification.
#[derive(Debug)]
pub struct MockDriver {
    caps: SessionCapabilities,
    state: Mutex<MockState>,
}

#[derive(Debug)]
struct MockState {
    screenshots: VecDeque<Vec<u8>>,
    screenshots_taken: usize,
    fail_screenshot_at: Option<usize>,
    pixel_ratio: f64,
    screen_width: f64,
    screen_height: f64,
    outer_width: f64,
    outer_height: f64,
    inner_height: f64,
    page_width: f64,
    page_height: f64,
    element_viewport: Option<(f64, f64)>,
    element_page: Option<(f64, f64)>,
    element_size: Option<(f64, f64)>,
    scroll_offsets: Vec<f64>,
    calls: Vec<String>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self {
            caps: SessionCapabilities::new().with_browser("chrome"),
            state: Mutex::new(MockState {
                screenshots: VecDeque::new(),
                screenshots_taken: 0,
                fail_screenshot_at: None,
                pixel_ratio: 1.0,
                screen_width: 1366.0,
                screen_height: 768.0,
                outer_width: 1366.0,
                outer_height: 768.0,
                inner_height: 768.0,
                page_width: 1366.0,
                page_height: 768.0,
                element_viewport: None,
                element_page: None,
                element_size: None,
                scroll_offsets: Vec::new(),
                calls: Vec::new(),
            }),
        }
    }
}

impl MockDriver {
    /// Create a desktop-chrome mock with a 1366x768 window
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the capability descriptor
    #[must_use]
    pub fn with_capabilities(mut self, caps: SessionCapabilities) -> Self {
        self.caps = caps;
        self
    }

    /// Queue a screenshot; a single queued screenshot is served repeatedly
    #[must_use]
    pub fn with_screenshot(self, png: Vec<u8>) -> Self {
        self.state.lock().unwrap().screenshots.push_back(png);
        self
    }

    /// Queue a series of screenshots served in order
    #[must_use]
    pub fn with_screenshot_series(self, series: Vec<Vec<u8>>) -> Self {
        self.state.lock().unwrap().screenshots.extend(series);
        self
    }

    /// Make the n-th screenshot call (0-based) fail
    #[must_use]
    pub fn with_failing_screenshot_at(self, index: usize) -> Self {
        self.state.lock().unwrap().fail_screenshot_at = Some(index);
        self
    }

    /// Set the reported device pixel ratio
    #[must_use]
    pub fn with_pixel_ratio(self, ratio: f64) -> Self {
        self.state.lock().unwrap().pixel_ratio = ratio;
        self
    }

    /// Set `window.screen` dimensions
    #[must_use]
    pub fn with_screen_size(self, width: f64, height: f64) -> Self {
        let mut state = self.state.lock().unwrap();
        state.screen_width = width;
        state.screen_height = height;
        drop(state);
        self
    }

    /// Set the outer window dimensions
    #[must_use]
    pub fn with_outer_size(self, width: f64, height: f64) -> Self {
        let mut state = self.state.lock().unwrap();
        state.outer_width = width;
        state.outer_height = height;
        drop(state);
        self
    }

    /// Set `window.innerHeight`
    #[must_use]
    pub fn with_inner_height(self, height: f64) -> Self {
        self.state.lock().unwrap().inner_height = height;
        self
    }

    /// Set the full scrollable document dimensions
    #[must_use]
    pub fn with_page_size(self, width: f64, height: f64) -> Self {
        let mut state = self.state.lock().unwrap();
        state.page_width = width;
        state.page_height = height;
        drop(state);
        self
    }

    /// Place the (single) mock element at a viewport-relative position
    #[must_use]
    pub fn with_element_viewport_position(self, x: f64, y: f64) -> Self {
        self.state.lock().unwrap().element_viewport = Some((x, y));
        self
    }

    /// Place the mock element at a document-relative position
    #[must_use]
    pub fn with_element_page_position(self, x: f64, y: f64) -> Self {
        self.state.lock().unwrap().element_page = Some((x, y));
        self
    }

    /// Set the mock element's size
    #[must_use]
    pub fn with_element_size(self, width: f64, height: f64) -> Self {
        self.state.lock().unwrap().element_size = Some((width, height));
        self
    }

    /// Recorded call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Whether a call with the given prefix was recorded
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .any(|c| c.starts_with(prefix))
    }

    /// Scroll offsets observed, in call order
    #[must_use]
    pub fn scroll_offsets(&self) -> Vec<f64> {
        self.state.lock().unwrap().scroll_offsets.clone()
    }

    /// Number of screenshots served
    #[must_use]
    pub fn screenshots_taken(&self) -> usize {
        self.state.lock().unwrap().screenshots_taken
    }

    fn arg_f64(args: &[Value], index: usize) -> f64 {
        args.get(index).and_then(Value::as_f64).unwrap_or(0.0)
    }

    fn position_value(point: Option<(f64, f64)>, y_offset: f64) -> Value {
        match point {
            Some((x, y)) => serde_json::json!({ "x": x, "y": y + y_offset }),
            None => Value::Null,
        }
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn capabilities(&self) -> RetratoResult<SessionCapabilities> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push("capabilities".to_string());
        Ok(self.caps.clone())
    }

    async fn take_screenshot(&self) -> RetratoResult<String> {
        use base64::Engine;

        let mut state = self.state.lock().unwrap();
        state.calls.push("takeScreenshot".to_string());

        let index = state.screenshots_taken;
        state.screenshots_taken += 1;
        if state.fail_screenshot_at == Some(index) {
            return Err(RetratoError::Screenshot {
                message: format!("mock screenshot {index} failed"),
            });
        }

        let png = if state.screenshots.len() > 1 {
            state.screenshots.pop_front()
        } else {
            state.screenshots.front().cloned()
        };
        let png = png.ok_or_else(|| RetratoError::Screenshot {
            message: "no mock screenshot set".to_string(),
        })?;

        Ok(base64::engine::general_purpose::STANDARD.encode(png))
    }

    async fn execute_script(&self, script: &str, args: Vec<Value>) -> RetratoResult<Value> {
        let mut state = self.state.lock().unwrap();

        if script == scripts::BROWSER_METRICS {
            state.calls.push("executeScript:browserMetrics".to_string());
            let is_mobile = args.first().and_then(Value::as_bool).unwrap_or(false);
            let (width, height) = if is_mobile {
                (state.screen_width, state.screen_height)
            } else {
                (state.outer_width, state.outer_height)
            };
            return Ok(serde_json::json!({
                "pixelRatio": state.pixel_ratio,
                "width": width,
                "height": height,
                "innerHeight": state.inner_height,
                "pageWidth": state.page_width,
                "pageHeight": state.page_height,
            }));
        }

        if script == scripts::VIEWPORT_ELEMENT_POSITION {
            state
                .calls
                .push("executeScript:viewportPosition".to_string());
            return Ok(Self::position_value(state.element_viewport, 0.0));
        }

        if script == scripts::IOS_ELEMENT_POSITION {
            state.calls.push("executeScript:iosPosition".to_string());
            let status_bar = Self::arg_f64(&args, 1);
            let address_bar = Self::arg_f64(&args, 2);
            let chrome_collapsed =
                state.inner_height == state.screen_height.max(state.screen_width);
            let offset = if chrome_collapsed {
                0.0
            } else {
                status_bar + address_bar
            };
            return Ok(Self::position_value(state.element_viewport, offset));
        }

        if script == scripts::ANDROID_ELEMENT_POSITION {
            state
                .calls
                .push("executeScript:androidPosition".to_string());
            let status_bar = Self::arg_f64(&args, 1);
            let address_bar = Self::arg_f64(&args, 2);
            let tool_bar = Self::arg_f64(&args, 3);
            let address_bar_visible = state.screen_height
                == status_bar + address_bar + tool_bar + state.inner_height;
            let offset = status_bar + if address_bar_visible { address_bar } else { 0.0 };
            return Ok(Self::position_value(state.element_viewport, offset));
        }

        Err(RetratoError::Script {
            message: "mock driver does not recognize this script".to_string(),
        })
    }

    async fn element_location(&self, element: &ElementHandle) -> RetratoResult<(f64, f64)> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("elementLocation:{}", element.selector()));
        state
            .element_page
            .ok_or_else(|| RetratoError::ElementNotFound {
                message: format!("no element matches selector '{}'", element.selector()),
            })
    }

    async fn element_size(&self, element: &ElementHandle) -> RetratoResult<(f64, f64)> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("elementSize:{}", element.selector()));
        state
            .element_size
            .ok_or_else(|| RetratoError::ElementNotFound {
                message: format!("no element matches selector '{}'", element.selector()),
            })
    }

    async fn set_window_size(&self, width: u32, height: u32) -> RetratoResult<()> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(format!("setWindowSize:{width}x{height}"));
        Ok(())
    }

    async fn scroll_to(&self, y: f64) -> RetratoResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("scrollTo:{y}"));
        state.scroll_offsets.push(y);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    #[tokio::test]
    async fn mock_serves_capabilities_and_records_calls() {
        let driver = MockDriver::new();
        let caps = driver.capabilities().await.unwrap();
        assert_eq!(caps.browser_name, "chrome");
        assert!(driver.was_called("capabilities"));
    }

    #[tokio::test]
    async fn mock_screenshot_roundtrips_base64() {
        let driver = MockDriver::new().with_screenshot(vec![1, 2, 3]);
        let payload = driver.take_screenshot().await.unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        assert_eq!(decoded, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn mock_single_screenshot_is_served_repeatedly() {
        let driver = MockDriver::new().with_screenshot(vec![7]);
        driver.take_screenshot().await.unwrap();
        driver.take_screenshot().await.unwrap();
        assert_eq!(driver.screenshots_taken(), 2);
    }

    #[tokio::test]
    async fn mock_screenshot_series_served_in_order() {
        let driver =
            MockDriver::new().with_screenshot_series(vec![vec![1], vec![2], vec![3]]);
        let first = driver.take_screenshot().await.unwrap();
        let second = driver.take_screenshot().await.unwrap();
        let decode = |payload: String| {
            base64::engine::general_purpose::STANDARD
                .decode(payload)
                .unwrap()
        };
        assert_eq!(decode(first), vec![1]);
        assert_eq!(decode(second), vec![2]);
    }

    #[tokio::test]
    async fn mock_screenshot_failure_injection() {
        let driver = MockDriver::new()
            .with_screenshot(vec![1])
            .with_failing_screenshot_at(1);
        assert!(driver.take_screenshot().await.is_ok());
        assert!(driver.take_screenshot().await.is_err());
    }

    #[tokio::test]
    async fn mock_answers_metrics_probe_for_desktop_and_mobile() {
        let driver = MockDriver::new()
            .with_screen_size(400.0, 700.0)
            .with_outer_size(1366.0, 768.0);

        let desktop = driver
            .execute_script(scripts::BROWSER_METRICS, vec![Value::Bool(false)])
            .await
            .unwrap();
        assert_eq!(desktop["width"], 1366.0);

        let mobile = driver
            .execute_script(scripts::BROWSER_METRICS, vec![Value::Bool(true)])
            .await
            .unwrap();
        assert_eq!(mobile["width"], 400.0);
    }

    #[tokio::test]
    async fn mock_position_probe_returns_null_without_element() {
        let driver = MockDriver::new();
        let value = driver
            .execute_script(
                scripts::VIEWPORT_ELEMENT_POSITION,
                vec![Value::String("#missing".to_string())],
            )
            .await
            .unwrap();
        assert!(value.is_null());
    }

    #[tokio::test]
    async fn mock_element_lookup_errors_when_unconfigured() {
        let driver = MockDriver::new();
        let element = ElementHandle::css("#logo");
        let err = driver.element_size(&element).await.unwrap_err();
        assert!(matches!(err, RetratoError::ElementNotFound { .. }));
    }

    #[tokio::test]
    async fn mock_records_scroll_offsets() {
        let driver = MockDriver::new();
        driver.scroll_to(0.0).await.unwrap();
        driver.scroll_to(400.0).await.unwrap();
        assert_eq!(driver.scroll_offsets(), vec![0.0, 400.0]);
    }

    #[test]
    fn decode_screenshot_rejects_garbage() {
        assert!(decode_screenshot("not-base-64!!!").is_err());

        let encoded = base64::engine::general_purpose::STANDARD.encode([9, 9]);
        assert_eq!(decode_screenshot(&encoded).unwrap(), vec![9, 9]);
    }

    #[tokio::test]
    async fn arc_delegation_reaches_the_mock() {
        let driver = Arc::new(MockDriver::new());
        let caps = PageDriver::capabilities(&driver).await.unwrap();
        assert_eq!(caps.browser_name, "chrome");
        assert!(driver.was_called("capabilities"));
    }
}
