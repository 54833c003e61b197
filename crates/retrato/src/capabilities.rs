//! Session identity and capture-strategy resolution.
//!
//! Different browser/automation combinations capture different visual
//! regions (viewport, whole document, or a mobile raster that excludes OS
//! chrome). The identity is resolved once per session from the automation
//! layer's capability descriptor and frozen; the positioning strategy is a
//! tagged union derived from it instead of re-evaluated string checks at
//! every call site.

use crate::result::{RetratoError, RetratoResult};
use serde::{Deserialize, Serialize};

/// Raw capability descriptor as reported by the automation layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionCapabilities {
    /// Browser name, e.g. "chrome" or "internet explorer"
    pub browser_name: String,
    /// Platform name, e.g. "iOS", "ANDROID", "linux"
    pub platform_name: String,
    /// Device name for mobile sessions, empty on desktop
    pub device_name: String,
    /// Whether the session captures native (OS-chrome-offset) screenshots
    pub native_web_screenshot: bool,
    /// Session log name, if the runner assigned one
    pub log_name: String,
    /// Test framework configured on the runner ("jasmine", "mocha", "custom", ...)
    pub framework: String,
}

impl SessionCapabilities {
    /// Create an empty descriptor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the browser name
    #[must_use]
    pub fn with_browser(mut self, name: impl Into<String>) -> Self {
        self.browser_name = name.into();
        self
    }

    /// Set the platform name
    #[must_use]
    pub fn with_platform(mut self, name: impl Into<String>) -> Self {
        self.platform_name = name.into();
        self
    }

    /// Set the device name
    #[must_use]
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    /// Set the native screenshot capability flag
    #[must_use]
    pub const fn with_native_screenshot(mut self, native: bool) -> Self {
        self.native_web_screenshot = native;
        self
    }

    /// Set the session log name
    #[must_use]
    pub fn with_log_name(mut self, name: impl Into<String>) -> Self {
        self.log_name = name.into();
        self
    }

    /// Set the runner's test framework name
    #[must_use]
    pub fn with_framework(mut self, name: impl Into<String>) -> Self {
        self.framework = name.into();
        self
    }
}

/// Positioning strategy for element geometry, derived once from [`Identity`].
///
/// Precedence, first match wins: `Ios`, then `AndroidNative` (any truthy
/// native-screenshot capability, regardless of browser), then `PageCapture`
/// (Firefox / Internet Explorer raster the whole document), then
/// `ViewportCapture` for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStrategy {
    /// iOS Safari: viewport-relative position plus collapsed-chrome handling
    Ios,
    /// Android native screenshots: status/address bar offsets apply
    AndroidNative,
    /// The raster covers the full document; use page-relative locations
    PageCapture,
    /// The raster covers the visible viewport; use `getBoundingClientRect`
    ViewportCapture,
}

/// Normalized, session-frozen browser/platform/device identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Camel-cased browser name ("internet explorer" -> "internetExplorer")
    pub browser_name: String,
    /// Lower-cased platform name
    pub platform_name: String,
    /// Camel-cased device name, empty on desktop
    pub device_name: String,
    /// Camel-cased session log name
    pub log_name: String,
    /// Native-screenshot capability flag
    pub native_web_screenshot: bool,
    /// Test framework configured on the runner
    pub framework: String,
}

impl Identity {
    /// Resolve an identity from the raw capability descriptor.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the automation layer reports no
    /// browser name at all.
    pub fn resolve(caps: &SessionCapabilities) -> RetratoResult<Self> {
        if caps.browser_name.trim().is_empty() {
            return Err(RetratoError::Config {
                message: "session capabilities report no browser name".to_string(),
            });
        }

        Ok(Self {
            browser_name: camel_case(&caps.browser_name),
            platform_name: caps.platform_name.to_lowercase(),
            device_name: camel_case(&caps.device_name),
            log_name: camel_case(&caps.log_name),
            native_web_screenshot: caps.native_web_screenshot,
            framework: caps.framework.clone(),
        })
    }

    /// Whether the browser is Firefox
    #[must_use]
    pub fn is_firefox(&self) -> bool {
        self.browser_name == "firefox"
    }

    /// Whether the browser is Internet Explorer
    #[must_use]
    pub fn is_internet_explorer(&self) -> bool {
        self.browser_name == "internetExplorer"
    }

    /// Whether the platform is Android
    #[must_use]
    pub fn is_android(&self) -> bool {
        self.platform_name == "android"
    }

    /// Whether the platform is iOS
    #[must_use]
    pub fn is_ios(&self) -> bool {
        self.platform_name == "ios"
    }

    /// Whether this is a mobile session (a device name was reported)
    #[must_use]
    pub fn is_mobile(&self) -> bool {
        !self.device_name.is_empty()
    }

    /// Pick the positioning strategy for this identity.
    ///
    /// First match wins: iOS, native screenshots, full-document browsers,
    /// viewport capture.
    #[must_use]
    pub fn strategy(&self) -> CaptureStrategy {
        if self.is_ios() {
            CaptureStrategy::Ios
        } else if self.native_web_screenshot {
            CaptureStrategy::AndroidNative
        } else if self.is_firefox() || self.is_internet_explorer() {
            CaptureStrategy::PageCapture
        } else {
            CaptureStrategy::ViewportCapture
        }
    }
}

/// Camel-case a capability or tag string for path-safe, stable names.
///
/// The first word character is lower-cased, every character following a
/// non-word character (spaces, hyphens, and other separators, as well as
/// boundaries created by digits) is upper-cased, existing capitals are kept,
/// and whitespace is stripped: `"Internet Explorer"` -> `"internetExplorer"`,
/// `"iPhone 6s Plus"` -> `"iPhone6sPlus"`.
#[must_use]
pub fn camel_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    let mut seen_word_char = false;

    for ch in text.chars() {
        if ch.is_whitespace() {
            prev = Some(ch);
            continue;
        }
        let is_word = ch.is_ascii_alphanumeric() || ch == '_';
        let at_boundary = prev.map_or(true, |p| !(p.is_ascii_alphanumeric() || p == '_'));

        if is_word && !seen_word_char {
            out.extend(ch.to_lowercase());
            seen_word_char = true;
        } else if is_word && at_boundary {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        prev = Some(ch);
    }

    out
}
