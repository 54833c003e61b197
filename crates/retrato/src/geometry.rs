//! Element geometry in captured-raster coordinates.
//!
//! The hardest correctness problem in the crate: where an element actually
//! sits on the captured image depends on whether the browser rasters the
//! viewport or the whole document, whether mobile OS chrome is excluded from
//! the capture, and the device pixel ratio. The resolver dispatches over the
//! session's [`CaptureStrategy`] and scales the result into physical pixels.

use crate::capabilities::{CaptureStrategy, Identity};
use crate::driver::{ElementHandle, PageDriver};
use crate::result::{RetratoError, RetratoResult};
use crate::scripts;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Crop region in the coordinate space of the raw captured raster.
///
/// All fields are integers already scaled by the device pixel ratio. The
/// rectangle is expected to lie within the captured image; out-of-bounds
/// rectangles are a caller error and surface at crop time, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rectangle {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Width, > 0
    pub width: u32,
    /// Height, > 0
    pub height: u32,
}

impl Rectangle {
    /// Create a rectangle
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Scale a logical-pixel rectangle into raster coordinates.
    ///
    /// Each field is floored first and multiplied by the device pixel ratio
    /// second; baselines were recorded with that order, and
    /// `floor(12.7) * 2 = 24` while `floor(12.7 * 2) = 25`.
    #[must_use]
    pub fn from_logical(x: f64, y: f64, width: f64, height: f64, dpr: u32) -> Self {
        let scale = |v: f64| (v.floor() as u32) * dpr;
        Self {
            x: scale(x),
            y: scale(y),
            width: scale(width),
            height: scale(height),
        }
    }

    /// Whether the rectangle lies fully within an image of the given size
    #[must_use]
    pub const fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        self.x + self.width <= image_width && self.y + self.height <= image_height
    }
}

/// iOS OS-chrome heights in logical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IosOffsets {
    /// Status bar height
    pub status_bar: u32,
    /// Address bar height
    pub address_bar: u32,
}

impl Default for IosOffsets {
    fn default() -> Self {
        Self {
            status_bar: 20,
            address_bar: 44,
        }
    }
}

/// Android OS-chrome heights in logical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AndroidOffsets {
    /// Status bar height
    pub status_bar: u32,
    /// Address bar height
    pub address_bar: u32,
    /// Tool bar height; participates in visibility checks but never in `y`
    pub tool_bar: u32,
}

impl Default for AndroidOffsets {
    fn default() -> Self {
        Self {
            status_bar: 24,
            address_bar: 53,
            tool_bar: 0,
        }
    }
}

/// Per-platform OS-chrome offsets, caller overrides merged over defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MobileOffsets {
    /// iOS offsets
    pub ios: IosOffsets,
    /// Android offsets
    pub android: AndroidOffsets,
}

impl MobileOffsets {
    /// Create with built-in defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the iOS offsets
    #[must_use]
    pub const fn with_ios(mut self, offsets: IosOffsets) -> Self {
        self.ios = offsets;
        self
    }

    /// Override the Android offsets
    #[must_use]
    pub const fn with_android(mut self, offsets: AndroidOffsets) -> Self {
        self.android = offsets;
        self
    }
}

/// Resolves an element's capture-space rectangle for a frozen identity.
#[derive(Debug, Clone, Default)]
pub struct GeometryResolver {
    offsets: MobileOffsets,
}

impl GeometryResolver {
    /// Create a resolver with the given OS-chrome offsets
    #[must_use]
    pub const fn new(offsets: MobileOffsets) -> Self {
        Self { offsets }
    }

    /// The active offsets
    #[must_use]
    pub const fn offsets(&self) -> &MobileOffsets {
        &self.offsets
    }

    /// Compute the element's rectangle in raster coordinates.
    ///
    /// The element size is queried independently of the position; both are
    /// floored and then scaled by the device pixel ratio.
    ///
    /// # Errors
    ///
    /// Propagates element-lookup failures from the automation layer and
    /// malformed page-side results.
    pub async fn resolve<D: PageDriver>(
        &self,
        driver: &D,
        element: &ElementHandle,
        identity: &Identity,
        dpr: u32,
    ) -> RetratoResult<Rectangle> {
        let (width, height) = driver.element_size(element).await?;
        let (x, y) = self.position(driver, element, identity).await?;
        Ok(Rectangle::from_logical(x, y, width, height, dpr))
    }

    /// Element position in logical pixels, by capture strategy.
    async fn position<D: PageDriver>(
        &self,
        driver: &D,
        element: &ElementHandle,
        identity: &Identity,
    ) -> RetratoResult<(f64, f64)> {
        let selector = Value::String(element.selector().to_string());

        match identity.strategy() {
            CaptureStrategy::Ios => {
                let value = driver
                    .execute_script(
                        scripts::IOS_ELEMENT_POSITION,
                        vec![
                            selector,
                            Value::from(self.offsets.ios.status_bar),
                            Value::from(self.offsets.ios.address_bar),
                        ],
                    )
                    .await?;
                Self::parse_point(value, element)
            }
            CaptureStrategy::AndroidNative => {
                let value = driver
                    .execute_script(
                        scripts::ANDROID_ELEMENT_POSITION,
                        vec![
                            selector,
                            Value::from(self.offsets.android.status_bar),
                            Value::from(self.offsets.android.address_bar),
                            Value::from(self.offsets.android.tool_bar),
                        ],
                    )
                    .await?;
                Self::parse_point(value, element)
            }
            CaptureStrategy::PageCapture => driver.element_location(element).await,
            CaptureStrategy::ViewportCapture => {
                let value = driver
                    .execute_script(scripts::VIEWPORT_ELEMENT_POSITION, vec![selector])
                    .await?;
                Self::parse_point(value, element)
            }
        }
    }

    fn parse_point(value: Value, element: &ElementHandle) -> RetratoResult<(f64, f64)> {
        if value.is_null() {
            return Err(RetratoError::ElementNotFound {
                message: format!("no element matches selector '{}'", element.selector()),
            });
        }
        let x = value.get("x").and_then(Value::as_f64);
        let y = value.get("y").and_then(Value::as_f64);
        match (x, y) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(RetratoError::Script {
                message: format!("position probe returned a malformed point: {value}"),
            }),
        }
    }
}
