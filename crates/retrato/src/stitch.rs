//! Full-page capture by scroll stitching.
//!
//! Browsers that only raster the visible viewport get their full-page image
//! assembled from viewport-height scroll steps. The loop is strictly
//! sequential: scroll position is shared browser state, and each step needs
//! a settle delay for lazy content and scrollbars before its capture. Any
//! failed step aborts the whole sequence and discards the strips taken so
//! far.

use crate::driver::{decode_screenshot, PageDriver};
use crate::result::{RetratoError, RetratoResult};
use image::{ImageEncoder, RgbaImage};
use std::time::Duration;

/// Default settle delay between scroll and capture.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// A composed full-page image.
#[derive(Debug, Clone)]
pub struct ComposedPage {
    /// PNG bytes of the stitched image
    pub png: Vec<u8>,
    /// Final width in physical pixels
    pub width: u32,
    /// Final height in physical pixels
    pub height: u32,
}

/// Assembles a full scrollable page out of viewport-sized captures.
#[derive(Debug, Clone)]
pub struct PageStitcher {
    settle_delay: Duration,
}

impl Default for PageStitcher {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl PageStitcher {
    /// Create a stitcher with the default settle delay
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the settle delay applied after every scroll step
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Scroll through the page, capture one strip per step and compose.
    ///
    /// `inner_height` and `page_height` are physical pixels; the scroll
    /// target converts back to CSS pixels with `inner_height / dpr`.
    ///
    /// # Errors
    ///
    /// Any scroll or capture failure aborts the sequence; partially taken
    /// strips are discarded.
    pub async fn capture<D: PageDriver>(
        &self,
        driver: &D,
        inner_height: u32,
        page_height: u32,
        dpr: u32,
    ) -> RetratoResult<ComposedPage> {
        if inner_height == 0 {
            return Err(RetratoError::Screenshot {
                message: "viewport height is zero, cannot stitch".to_string(),
            });
        }

        let steps = step_count(page_height, inner_height);
        let scroll_step = f64::from(inner_height) / f64::from(dpr.max(1));

        let mut strips = Vec::with_capacity(steps as usize);
        for i in 0..steps {
            driver.scroll_to(scroll_step * f64::from(i)).await?;
            tokio::time::sleep(self.settle_delay).await;

            let payload = driver.take_screenshot().await?;
            let png = decode_screenshot(&payload)?;
            let strip =
                image::load_from_memory(&png).map_err(|e| RetratoError::ImageProcessing {
                    message: format!("failed to decode scroll strip {i}: {e}"),
                })?;
            strips.push(strip.to_rgba8());
        }

        let trim = overlap(inner_height, steps, page_height);
        let composed = compose_strips(&strips, trim)?;

        let (width, height) = composed.dimensions();
        let mut buffer = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buffer);
        encoder
            .write_image(
                composed.as_raw(),
                width,
                height,
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|e| RetratoError::ImageProcessing {
                message: format!("failed to encode stitched page: {e}"),
            })?;

        Ok(ComposedPage {
            png: buffer,
            width,
            height,
        })
    }
}

/// Number of viewport-height scroll steps needed to cover the page
#[must_use]
pub const fn step_count(page_height: u32, inner_height: u32) -> u32 {
    if inner_height == 0 || page_height == 0 {
        return 1;
    }
    page_height.div_ceil(inner_height)
}

/// Redundant bottom strip height left over when steps overshoot the page
#[must_use]
pub const fn overlap(inner_height: u32, steps: u32, page_height: u32) -> u32 {
    (inner_height * steps).saturating_sub(page_height)
}

/// Stack strips vertically in capture order and trim the bottom overlap.
///
/// The degenerate single-strip case runs through the same path for output
/// consistency.
///
/// # Errors
///
/// Fails on an empty strip list, mismatched strip widths, or a trim that
/// consumes the whole composition.
pub fn compose_strips(strips: &[RgbaImage], trim_bottom: u32) -> RetratoResult<RgbaImage> {
    let first = strips.first().ok_or_else(|| RetratoError::ImageProcessing {
        message: "no strips to compose".to_string(),
    })?;

    let width = first.width();
    let raw_height: u32 = strips.iter().map(RgbaImage::height).sum();
    if strips.iter().any(|s| s.width() != width) {
        return Err(RetratoError::ImageProcessing {
            message: "scroll strips have mismatched widths".to_string(),
        });
    }
    if trim_bottom >= raw_height {
        return Err(RetratoError::ImageProcessing {
            message: format!(
                "overlap trim {trim_bottom} consumes the whole composed height {raw_height}"
            ),
        });
    }

    let final_height = raw_height - trim_bottom;
    let mut composed = RgbaImage::new(width, final_height);

    let mut offset = 0u32;
    for strip in strips {
        for y in 0..strip.height() {
            let target_y = offset + y;
            if target_y >= final_height {
                break;
            }
            for x in 0..width {
                composed.put_pixel(x, target_y, *strip.get_pixel(x, y));
            }
        }
        offset += strip.height();
    }

    Ok(composed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MockDriver;
    use image::Rgba;

    fn strip_png(width: u32, height: u32, shade: u8) -> Vec<u8> {
        let mut img = RgbaImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = Rgba([shade, shade, shade, 255]);
        }
        let mut buffer = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buffer);
        encoder
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
            .unwrap();
        buffer
    }

    fn strip(width: u32, height: u32, shade: u8) -> RgbaImage {
        image::load_from_memory(&strip_png(width, height, shade))
            .unwrap()
            .to_rgba8()
    }

    #[test]
    fn step_count_rounds_up() {
        assert_eq!(step_count(1000, 400), 3);
        assert_eq!(step_count(800, 400), 2);
        assert_eq!(step_count(300, 400), 1);
        assert_eq!(step_count(0, 400), 1);
    }

    #[test]
    fn overlap_is_overshoot_past_page_bottom() {
        // 3 steps of 400 cover 1200 for a 1000-tall page: 200 to trim.
        assert_eq!(overlap(400, 3, 1000), 200);
        assert_eq!(overlap(400, 2, 800), 0);
    }

    #[test]
    fn compose_trims_from_the_bottom() {
        let strips = vec![strip(8, 400, 10), strip(8, 400, 20), strip(8, 400, 30)];
        let composed = compose_strips(&strips, 200).unwrap();
        assert_eq!(composed.dimensions(), (8, 1000));
        // Order preserved: shades at each band, trim removed bottom rows only.
        assert_eq!(composed.get_pixel(0, 0)[0], 10);
        assert_eq!(composed.get_pixel(0, 500)[0], 20);
        assert_eq!(composed.get_pixel(0, 999)[0], 30);
    }

    #[test]
    fn compose_rejects_empty_and_mismatched_input() {
        assert!(compose_strips(&[], 0).is_err());

        let strips = vec![strip(8, 10, 1), strip(9, 10, 2)];
        assert!(compose_strips(&strips, 0).is_err());
    }

    #[test]
    fn compose_rejects_full_trim() {
        let strips = vec![strip(8, 10, 1)];
        assert!(compose_strips(&strips, 10).is_err());
    }

    #[tokio::test]
    async fn capture_scrolls_settles_and_trims() {
        let driver = MockDriver::new().with_screenshot_series(vec![
            strip_png(8, 400, 10),
            strip_png(8, 400, 20),
            strip_png(8, 400, 30),
        ]);
        let stitcher = PageStitcher::new().with_settle_delay(Duration::ZERO);

        let page = stitcher.capture(&driver, 400, 1000, 1).await.unwrap();
        assert_eq!((page.width, page.height), (8, 1000));
        assert_eq!(driver.scroll_offsets(), vec![0.0, 400.0, 800.0]);

        let decoded = image::load_from_memory(&page.png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0)[0], 10);
        assert_eq!(decoded.get_pixel(0, 999)[0], 30);
    }

    #[tokio::test]
    async fn capture_scroll_targets_are_css_pixels() {
        // inner height is physical; scroll targets divide the DPR back out.
        let driver = MockDriver::new().with_screenshot_series(vec![
            strip_png(4, 800, 10),
            strip_png(4, 800, 20),
        ]);
        let stitcher = PageStitcher::new().with_settle_delay(Duration::ZERO);

        stitcher.capture(&driver, 800, 1600, 2).await.unwrap();
        assert_eq!(driver.scroll_offsets(), vec![0.0, 400.0]);
    }

    #[tokio::test]
    async fn single_step_page_still_composes_and_trims() {
        let driver = MockDriver::new().with_screenshot(strip_png(8, 400, 10));
        let stitcher = PageStitcher::new().with_settle_delay(Duration::ZERO);

        let page = stitcher.capture(&driver, 400, 300, 1).await.unwrap();
        assert_eq!((page.width, page.height), (8, 300));
        assert_eq!(driver.scroll_offsets(), vec![0.0]);
    }

    #[tokio::test]
    async fn failed_step_aborts_the_sequence() {
        let driver = MockDriver::new()
            .with_screenshot_series(vec![strip_png(8, 400, 10), strip_png(8, 400, 20)])
            .with_failing_screenshot_at(1);
        let stitcher = PageStitcher::new().with_settle_delay(Duration::ZERO);

        let err = stitcher.capture(&driver, 400, 1000, 1).await.unwrap_err();
        assert!(matches!(err, RetratoError::Screenshot { .. }));
        // The third step never ran.
        assert_eq!(driver.scroll_offsets(), vec![0.0, 400.0]);
    }

    #[tokio::test]
    async fn zero_viewport_height_is_rejected() {
        let driver = MockDriver::new();
        let stitcher = PageStitcher::new().with_settle_delay(Duration::ZERO);
        assert!(stitcher.capture(&driver, 0, 1000, 1).await.is_err());
    }
}
