//! Save-then-check round trip against a scripted driver.
//!
//! Run with: `cargo run --example capture_demo`

use image::{ImageEncoder, Rgba};
use retrato::{
    CaptureSession, CheckOptions, CompareEngine, CompareOutcome, CompareRequest, DiffCode,
    MockDriver, RetratoResult, SessionConfig,
};
use std::sync::Arc;

/// Byte-equality stand-in for a real diff engine.
struct ByteDiffEngine;

impl CompareEngine for ByteDiffEngine {
    fn compare(&self, request: &CompareRequest) -> RetratoResult<CompareOutcome> {
        let baseline = std::fs::read(&request.baseline_path)?;
        let identical = baseline == request.candidate;
        Ok(CompareOutcome {
            code: if identical {
                DiffCode::Identical
            } else {
                DiffCode::Different
            },
            differences: u64::from(!identical),
            dimension: baseline.len() as u64,
        })
    }
}

fn sample_png() -> Vec<u8> {
    let mut img = image::RgbaImage::new(32, 32);
    for pixel in img.pixels_mut() {
        *pixel = Rgba([40, 90, 160, 255]);
    }
    let mut buffer = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buffer)
        .write_image(img.as_raw(), 32, 32, image::ExtendedColorType::Rgba8)
        .expect("encode sample image");
    buffer
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> RetratoResult<()> {
    let root = std::env::temp_dir().join("retrato_capture_demo");
    let driver = Arc::new(MockDriver::new().with_screenshot(sample_png()));

    let config = SessionConfig::new()
        .with_base_path(root.join("baseline"))
        .with_diff_path(root.join("screenshots"))
        .with_baseline(true);
    let session = CaptureSession::initialize(config, Arc::clone(&driver), ByteDiffEngine).await?;

    session.save_screen("demo page").await?;
    let outcome = session.check_screen("demo page", CheckOptions::new()).await?;

    println!(
        "check passed: {} ({} differing pixels, {:.2}%)",
        outcome.is_passing(),
        outcome.differences,
        outcome.difference_percent()
    );
    Ok(())
}
