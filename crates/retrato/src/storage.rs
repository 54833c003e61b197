//! Baseline and difference-image persistence.
//!
//! Baselines live flat under the base path; difference images go to a
//! dedicated `diff/` directory under the diff path, keyed by the baseline
//! file name. Save paths are the only writers of baseline files; check paths
//! only read them.

use crate::geometry::Rectangle;
use crate::result::{RetratoError, RetratoResult};
use image::{GenericImageView, ImageEncoder};
use std::path::{Path, PathBuf};

/// Directory pair for baseline and difference images.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    base_path: PathBuf,
    diff_path: PathBuf,
}

impl BaselineStore {
    /// Open the store, creating both directories when absent.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when a directory cannot be created.
    pub fn open(base_path: impl Into<PathBuf>, diff_path: impl Into<PathBuf>) -> RetratoResult<Self> {
        let base_path = base_path.into();
        let diff_path: PathBuf = diff_path.into();
        let diff_path = diff_path.join("diff");

        std::fs::create_dir_all(&base_path)?;
        std::fs::create_dir_all(&diff_path)?;

        Ok(Self {
            base_path,
            diff_path,
        })
    }

    /// Baseline directory
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_path
    }

    /// Difference-image directory (`<diffPath>/diff`)
    #[must_use]
    pub fn diff_dir(&self) -> &Path {
        &self.diff_path
    }

    /// Full path of a baseline image
    #[must_use]
    pub fn baseline_path(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }

    /// Full path of a difference image; only the basename of the image name
    /// is used under the diff directory.
    #[must_use]
    pub fn diff_output_path(&self, name: &str) -> PathBuf {
        let basename = Path::new(name)
            .file_name()
            .map_or_else(|| PathBuf::from(name), PathBuf::from);
        self.diff_path.join(basename)
    }

    /// Whether a baseline exists for the given image name
    #[must_use]
    pub fn baseline_exists(&self, name: &str) -> bool {
        self.baseline_path(name).is_file()
    }

    /// Write a baseline image, optionally cropping first.
    ///
    /// # Errors
    ///
    /// Returns a crop error when the rectangle exceeds the image bounds, an
    /// image-processing error when the PNG cannot be decoded or re-encoded,
    /// or an I/O error from the write.
    pub fn write_baseline(
        &self,
        name: &str,
        png: &[u8],
        crop: Option<Rectangle>,
    ) -> RetratoResult<PathBuf> {
        let path = self.baseline_path(name);
        write_png(&path, png, crop)?;
        Ok(path)
    }
}

/// Write PNG bytes to a path, cropping first when a rectangle is given.
///
/// Uncropped writes pass the bytes through untouched.
///
/// # Errors
///
/// See [`BaselineStore::write_baseline`].
pub fn write_png(path: &Path, png: &[u8], crop: Option<Rectangle>) -> RetratoResult<()> {
    match crop {
        None => std::fs::write(path, png)?,
        Some(rect) => {
            let cropped = crop_png(png, rect)?;
            std::fs::write(path, cropped)?;
        }
    }
    Ok(())
}

/// Crop PNG bytes to a rectangle and re-encode.
///
/// # Errors
///
/// Returns a crop error when the rectangle exceeds the image bounds, or an
/// image-processing error on decode/encode failure.
pub fn crop_png(png: &[u8], rect: Rectangle) -> RetratoResult<Vec<u8>> {
    let img = image::load_from_memory(png).map_err(|e| RetratoError::ImageProcessing {
        message: format!("failed to decode captured image: {e}"),
    })?;

    let (width, height) = img.dimensions();
    if !rect.fits_within(width, height) {
        return Err(RetratoError::Crop {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            image_width: width,
            image_height: height,
        });
    }

    let cropped = img.crop_imm(rect.x, rect.y, rect.width, rect.height);
    let rgba = cropped.to_rgba8();

    let mut buffer = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buffer);
    encoder
        .write_image(
            rgba.as_raw(),
            rect.width,
            rect.height,
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| RetratoError::ImageProcessing {
            message: format!("failed to encode cropped image: {e}"),
        })?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn test_png(width: u32, height: u32) -> Vec<u8> {
        let mut img = image::RgbaImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = Rgba([120, 30, 60, 255]);
        }
        let mut buffer = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buffer);
        encoder
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
            .unwrap();
        buffer
    }

    #[test]
    fn open_creates_both_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::open(
            dir.path().join("baseline"),
            dir.path().join("screenshots"),
        )
        .unwrap();
        assert!(store.base_dir().is_dir());
        assert!(store.diff_dir().is_dir());
        assert!(store.diff_dir().ends_with("diff"));
    }

    #[test]
    fn uncropped_write_is_byte_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::open(dir.path().join("b"), dir.path().join("d")).unwrap();

        let png = test_png(4, 4);
        let path = store.write_baseline("shot.png", &png, None).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), png);
        assert!(store.baseline_exists("shot.png"));
    }

    #[test]
    fn cropped_write_produces_cropped_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::open(dir.path().join("b"), dir.path().join("d")).unwrap();

        let png = test_png(10, 10);
        let path = store
            .write_baseline("shot.png", &png, Some(Rectangle::new(2, 3, 5, 4)))
            .unwrap();

        let written = image::load_from_memory(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(written.dimensions(), (5, 4));
    }

    #[test]
    fn out_of_bounds_crop_is_rejected() {
        let png = test_png(10, 10);
        let err = crop_png(&png, Rectangle::new(8, 8, 5, 5)).unwrap_err();
        assert!(matches!(err, RetratoError::Crop { .. }));
    }

    #[test]
    fn invalid_png_is_an_image_processing_error() {
        let err = crop_png(&[0, 1, 2, 3], Rectangle::new(0, 0, 1, 1)).unwrap_err();
        assert!(matches!(err, RetratoError::ImageProcessing { .. }));
    }

    #[test]
    fn diff_output_uses_only_the_basename() {
        let dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::open(dir.path().join("b"), dir.path().join("d")).unwrap();

        let path = store.diff_output_path("nested/dir/shot.png");
        assert_eq!(path, store.diff_dir().join("shot.png"));
    }

    #[test]
    fn baseline_exists_is_false_for_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::open(dir.path().join("b"), dir.path().join("d")).unwrap();
        assert!(!store.baseline_exists("nope.png"));
    }
}
