//! Retrato: visual-regression capture for browser tests.
//!
//! Retrato (Spanish: "portrait") captures screenshots of a page rendered in
//! a real browser — the visible screen, a single element's region, or the
//! full scrollable page — stores and retrieves baseline images, normalizes
//! element coordinates and device pixel ratio across browser/platform
//! combinations, and delegates pixel comparison to an external diff engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      CaptureSession (facade)                     │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────┐  ┌──────────┐  ┌───────────────┐  │
//! │  │ Identity/ │  │ Geometry  │  │  Page    │  │ ImageName     │  │
//! │  │ Strategy  │─►│ Resolver  │  │ Stitcher │  │ Format        │  │
//! │  └───────────┘  └───────────┘  └──────────┘  └───────────────┘  │
//! │        │              │              │                │          │
//! │        ▼              ▼              ▼                ▼          │
//! │  ┌───────────────────────────┐  ┌──────────────────────────┐    │
//! │  │ PageDriver (automation)   │  │ BaselineStore + Compare  │    │
//! │  │ CDP / WebDriver / mock    │  │ Engine (black box)       │    │
//! │  └───────────────────────────┘  └──────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The session resolves the browser identity once, then every operation
//! refreshes per-call browser metrics, captures (stitching scroll steps for
//! full pages), and either persists a baseline or hands the candidate to
//! the compare engine. A check with no baseline fails; with the `baseline`
//! flag it writes the missing image first and still fails, so a suite run
//! bootstraps its references without silently passing.

#![warn(missing_docs)]

pub mod capabilities;
pub mod compare;
pub mod driver;
pub mod geometry;
pub mod name_format;
pub mod result;
pub mod scripts;
pub mod session;
pub mod stitch;
pub mod storage;

/// Chromium CDP driver adapter (requires the `browser` feature)
#[cfg(feature = "browser")]
pub mod cdp;

pub use capabilities::{camel_case, CaptureStrategy, Identity, SessionCapabilities};
pub use compare::{
    overlay_overrides, CompareEngine, CompareOutcome, CompareRequest, DiffCode, OutputPolicy,
};
pub use driver::{decode_screenshot, ElementHandle, MockDriver, PageDriver};
pub use geometry::{AndroidOffsets, GeometryResolver, IosOffsets, MobileOffsets, Rectangle};
pub use name_format::{overlay_defaults, ImageNameFormat, DEFAULT_TEMPLATE};
pub use result::{RetratoError, RetratoResult};
pub use session::{CaptureContext, CaptureSession, CheckOptions, SessionConfig};
pub use stitch::{ComposedPage, PageStitcher, DEFAULT_SETTLE_DELAY};
pub use storage::{crop_png, write_png, BaselineStore};

#[cfg(feature = "browser")]
pub use cdp::ChromiumDriver;
