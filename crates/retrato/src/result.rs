//! Result and error types for Retrato.

use thiserror::Error;

/// Result type for Retrato operations
pub type RetratoResult<T> = Result<T, RetratoError>;

/// Errors that can occur in Retrato
#[derive(Debug, Error)]
pub enum RetratoError {
    /// Missing or invalid session configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// The automation layer could not locate or measure the target element
    #[error("Element not found: {message}")]
    ElementNotFound {
        /// Error message
        message: String,
    },

    /// A check was run against a tag that has no baseline image
    #[error("Baseline image not found: {path}")]
    BaselineNotFound {
        /// Expected baseline path
        path: String,
    },

    /// A check found no baseline and wrote one; the check itself still fails
    #[error("Baseline image not found, saved current capture as new baseline: {path}")]
    BaselineCreated {
        /// Path of the freshly written baseline
        path: String,
    },

    /// A crop rectangle lies outside the captured image bounds
    #[error(
        "Crop rectangle {x},{y} {width}x{height} exceeds image bounds {image_width}x{image_height}"
    )]
    Crop {
        /// Rectangle left edge
        x: u32,
        /// Rectangle top edge
        y: u32,
        /// Rectangle width
        width: u32,
        /// Rectangle height
        height: u32,
        /// Captured image width
        image_width: u32,
        /// Captured image height
        image_height: u32,
    },

    /// The external compare engine failed
    #[error("Image comparison failed: {message}")]
    Compare {
        /// Error message
        message: String,
    },

    /// Screenshot capture or payload decoding failed
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// In-page script execution failed
    #[error("Page script failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// Raster decode/encode failed
    #[error("Image processing failed: {message}")]
    ImageProcessing {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
