//! Chromium CDP adapter for the [`PageDriver`] surface.
//!
//! Attaches to an existing `chromiumoxide` page; launching and closing the
//! browser stay with the caller. Screenshots come back as the protocol's
//! base64 payload, scripts run through `Runtime.evaluate`, and window sizing
//! goes through the device-metrics override.

use crate::capabilities::SessionCapabilities;
use crate::driver::{ElementHandle, PageDriver};
use crate::result::{RetratoError, RetratoResult};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use chromiumoxide::page::Page;
use serde_json::Value;

/// [`PageDriver`] implementation over a live CDP page.
#[derive(Debug, Clone)]
pub struct ChromiumDriver {
    page: Page,
    caps: SessionCapabilities,
}

impl ChromiumDriver {
    /// Attach to an existing page with default desktop-chrome capabilities
    #[must_use]
    pub fn attach(page: Page) -> Self {
        Self {
            page,
            caps: SessionCapabilities::new().with_browser("chrome"),
        }
    }

    /// Replace the capability descriptor reported to the session
    #[must_use]
    pub fn with_capabilities(mut self, caps: SessionCapabilities) -> Self {
        self.caps = caps;
        self
    }

    async fn evaluate(&self, expression: String) -> RetratoResult<Value> {
        let result =
            self.page
                .evaluate(expression)
                .await
                .map_err(|e| RetratoError::Script {
                    message: e.to_string(),
                })?;
        result
            .into_value()
            .or_else(|_| Ok(Value::Null))
    }

    async fn element_rect_field(
        &self,
        element: &ElementHandle,
        fields: &str,
    ) -> RetratoResult<(f64, f64)> {
        let selector = serde_json::to_string(element.selector())?;
        let expression = format!(
            "(function (selector) {{ \
                var element = document.querySelector(selector); \
                if (!element) {{ return null; }} \
                var rect = element.getBoundingClientRect(); \
                return {fields}; \
            }})({selector})"
        );
        let value = self.evaluate(expression).await?;
        if value.is_null() {
            return Err(RetratoError::ElementNotFound {
                message: format!("no element matches selector '{}'", element.selector()),
            });
        }
        let first = value.get("a").and_then(Value::as_f64);
        let second = value.get("b").and_then(Value::as_f64);
        match (first, second) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(RetratoError::Script {
                message: format!("element probe returned a malformed value: {value}"),
            }),
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn capabilities(&self) -> RetratoResult<SessionCapabilities> {
        Ok(self.caps.clone())
    }

    async fn take_screenshot(&self) -> RetratoResult<String> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let screenshot =
            self.page
                .execute(params)
                .await
                .map_err(|e| RetratoError::Screenshot {
                    message: e.to_string(),
                })?;
        Ok(screenshot.data.clone())
    }

    async fn execute_script(&self, script: &str, args: Vec<Value>) -> RetratoResult<Value> {
        let args_json = serde_json::to_string(&args)?;
        self.evaluate(format!("({script}).apply(null, {args_json})"))
            .await
    }

    async fn element_location(&self, element: &ElementHandle) -> RetratoResult<(f64, f64)> {
        self.element_rect_field(
            element,
            "{ a: rect.left + window.scrollX, b: rect.top + window.scrollY }",
        )
        .await
    }

    async fn element_size(&self, element: &ElementHandle) -> RetratoResult<(f64, f64)> {
        self.element_rect_field(element, "{ a: rect.width, b: rect.height }")
            .await
    }

    async fn set_window_size(&self, width: u32, height: u32) -> RetratoResult<()> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(width))
            .height(i64::from(height))
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| RetratoError::Config {
                message: e.to_string(),
            })?;
        self.page
            .execute(params)
            .await
            .map_err(|e| RetratoError::Script {
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn scroll_to(&self, y: f64) -> RetratoResult<()> {
        self.evaluate(format!("window.scrollTo(0, {y})")).await?;
        Ok(())
    }
}
