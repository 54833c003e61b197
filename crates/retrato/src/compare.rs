//! External image-comparison collaborator interface.
//!
//! The pixel-difference algorithm itself lives outside this crate. The
//! orchestrator hands a [`CompareRequest`] to a [`CompareEngine`] and
//! returns the [`CompareOutcome`] unmodified; engine tuning options ride in
//! a free-form JSON map the engine interprets.

use crate::geometry::Rectangle;
use crate::result::RetratoResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Comparison verdict, passed through from the external engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffCode {
    /// The engine could not classify the pair
    Unknown,
    /// Images differ beyond the engine's tolerance
    Different,
    /// Images are pixel-identical
    Identical,
    /// Images differ within the engine's tolerance
    Similar,
}

impl DiffCode {
    /// Numeric wire code used by the external engine
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Different => 1,
            Self::Identical => 5,
            Self::Similar => 7,
        }
    }

    /// Map a numeric wire code back; anything unrecognized is `Unknown`
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Different,
            5 => Self::Identical,
            7 => Self::Similar,
            _ => Self::Unknown,
        }
    }
}

/// Result of one comparison, produced by the engine and returned unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompareOutcome {
    /// Verdict code
    pub code: DiffCode,
    /// Number of differing pixels
    pub differences: u64,
    /// Total pixel dimension of the compared area
    pub dimension: u64,
}

impl CompareOutcome {
    /// Whether the comparison passed (identical or within tolerance)
    #[must_use]
    pub const fn is_passing(&self) -> bool {
        matches!(self.code, DiffCode::Identical | DiffCode::Similar)
    }

    /// Differing pixels as a percentage of the compared area
    #[must_use]
    pub fn difference_percent(&self) -> f64 {
        if self.dimension == 0 {
            return 0.0;
        }
        (self.differences as f64 / self.dimension as f64) * 100.0
    }
}

/// When the engine should write a difference image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputPolicy {
    /// Always write an output image
    All,
    /// Write for similar and different results
    Similar,
    /// Write only when the images are different
    #[default]
    Different,
}

/// One comparison job for the external engine.
#[derive(Debug, Clone)]
pub struct CompareRequest {
    /// Path of the stored baseline image
    pub baseline_path: PathBuf,
    /// Freshly captured PNG bytes
    pub candidate: Vec<u8>,
    /// Where a difference image should be written
    pub output_path: PathBuf,
    /// Crop applied to the candidate before comparing (region checks)
    pub crop: Option<Rectangle>,
    /// Merged engine options, handed through unchanged
    pub options: BTreeMap<String, Value>,
}

impl CompareRequest {
    /// The effective output policy from the merged options.
    ///
    /// Defaults to [`OutputPolicy::Different`] when absent or unparseable.
    #[must_use]
    pub fn output_policy(&self) -> OutputPolicy {
        self.options
            .get("outputPolicy")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}

/// Fill/replace merge where `explicit` (the caller) wins on collision.
///
/// Counterpart of [`crate::name_format::overlay_defaults`], which applies
/// the opposite precedence; the two are deliberately separate operations.
#[must_use]
pub fn overlay_overrides(
    mut base: BTreeMap<String, Value>,
    explicit: &BTreeMap<String, Value>,
) -> BTreeMap<String, Value> {
    for (key, value) in explicit {
        base.insert(key.clone(), value.clone());
    }
    base
}

/// Black-box pixel comparator.
///
/// Implementations decode both images, apply the optional crop to the
/// candidate, honor the output policy for difference images, and report a
/// verdict. This crate ships no implementation of the algorithm.
pub trait CompareEngine: Send + Sync {
    /// Run one comparison
    ///
    /// # Errors
    ///
    /// Returns a compare error when the engine itself fails, e.g. on
    /// corrupt image bytes.
    fn compare(&self, request: &CompareRequest) -> RetratoResult<CompareOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_round_trip() {
        assert_eq!(DiffCode::Unknown.code(), 0);
        assert_eq!(DiffCode::Different.code(), 1);
        assert_eq!(DiffCode::Identical.code(), 5);
        assert_eq!(DiffCode::Similar.code(), 7);

        for code in [
            DiffCode::Unknown,
            DiffCode::Different,
            DiffCode::Identical,
            DiffCode::Similar,
        ] {
            assert_eq!(DiffCode::from_code(code.code()), code);
        }
        assert_eq!(DiffCode::from_code(42), DiffCode::Unknown);
    }

    #[test]
    fn identical_and_similar_pass() {
        let outcome = |code| CompareOutcome {
            code,
            differences: 0,
            dimension: 100,
        };
        assert!(outcome(DiffCode::Identical).is_passing());
        assert!(outcome(DiffCode::Similar).is_passing());
        assert!(!outcome(DiffCode::Different).is_passing());
        assert!(!outcome(DiffCode::Unknown).is_passing());
    }

    #[test]
    fn difference_percent_handles_empty_dimension() {
        let outcome = CompareOutcome {
            code: DiffCode::Unknown,
            differences: 5,
            dimension: 0,
        };
        assert_eq!(outcome.difference_percent(), 0.0);

        let outcome = CompareOutcome {
            code: DiffCode::Different,
            differences: 25,
            dimension: 10_000,
        };
        assert_eq!(outcome.difference_percent(), 0.25);
    }

    #[test]
    fn overlay_overrides_second_argument_wins() {
        let mut base = BTreeMap::new();
        base.insert("outputPolicy".to_string(), Value::String("different".into()));
        base.insert("threshold".to_string(), Value::from(0.01));

        let mut explicit = BTreeMap::new();
        explicit.insert("outputPolicy".to_string(), Value::String("all".into()));

        let merged = overlay_overrides(base, &explicit);
        assert_eq!(*merged.get("outputPolicy").unwrap(), "all");
        assert_eq!(*merged.get("threshold").unwrap(), 0.01);
    }

    #[test]
    fn output_policy_defaults_to_different() {
        let request = CompareRequest {
            baseline_path: PathBuf::from("base.png"),
            candidate: vec![],
            output_path: PathBuf::from("diff.png"),
            crop: None,
            options: BTreeMap::new(),
        };
        assert_eq!(request.output_policy(), OutputPolicy::Different);
    }

    #[test]
    fn output_policy_parses_from_merged_options() {
        let mut options = BTreeMap::new();
        options.insert("outputPolicy".to_string(), Value::String("all".into()));
        let request = CompareRequest {
            baseline_path: PathBuf::from("base.png"),
            candidate: vec![],
            output_path: PathBuf::from("diff.png"),
            crop: None,
            options,
        };
        assert_eq!(request.output_policy(), OutputPolicy::All);
    }
}
