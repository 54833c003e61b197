//! Deterministic baseline/diff file naming.
//!
//! A tag plus the session identity and capture dimensions render through a
//! `{placeholder}` template into a stable, path-safe file name. Formatting is
//! a pure function: same inputs, byte-identical output.

use crate::capabilities::{camel_case, Identity};
use std::collections::BTreeMap;

/// Default image name template.
pub const DEFAULT_TEMPLATE: &str = "{tag}-{browserName}-{width}x{height}-dpr-{dpr}";

/// Template-driven image name formatter.
#[derive(Debug, Clone)]
pub struct ImageNameFormat {
    /// Template with `{key}` placeholders
    template: String,
    /// Caller-supplied extra template variables
    custom: BTreeMap<String, String>,
}

impl Default for ImageNameFormat {
    fn default() -> Self {
        Self {
            template: String::from(DEFAULT_TEMPLATE),
            custom: BTreeMap::new(),
        }
    }
}

impl ImageNameFormat {
    /// Create a formatter with the default template
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the template
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Add a caller-supplied template variable.
    ///
    /// Custom variables never shadow the built-in ones; on a key collision
    /// the computed default wins.
    #[must_use]
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    /// The active template string
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the image file name for a tag.
    ///
    /// Builds the default variable map (camel-cased tag, identity names,
    /// dimensions, device pixel ratio), overlays the custom variables where
    /// they do not collide, substitutes every `{key}` occurrence literally
    /// and appends the fixed `.png` suffix. Placeholders with no matching
    /// key are left verbatim.
    #[must_use]
    pub fn format(&self, tag: &str, identity: &Identity, width: u32, height: u32, dpr: u32) -> String {
        let mut defaults = BTreeMap::new();
        defaults.insert("tag".to_string(), camel_case(tag));
        defaults.insert("browserName".to_string(), identity.browser_name.clone());
        defaults.insert("deviceName".to_string(), identity.device_name.clone());
        defaults.insert("logName".to_string(), identity.log_name.clone());
        defaults.insert("name".to_string(), identity.log_name.clone());
        defaults.insert("dpr".to_string(), dpr.to_string());
        defaults.insert("width".to_string(), width.to_string());
        defaults.insert("height".to_string(), height.to_string());

        let vars = overlay_defaults(defaults, &self.custom);

        let mut rendered = self.template.clone();
        for (key, value) in &vars {
            rendered = rendered.replace(&format!("{{{key}}}"), value);
        }

        format!("{rendered}.png")
    }
}

/// Fill-missing-keys merge where `defaults` wins on collision.
///
/// Counterpart of [`crate::compare::overlay_overrides`], which applies the
/// opposite precedence; the two are deliberately separate operations.
#[must_use]
pub fn overlay_defaults(
    mut defaults: BTreeMap<String, String>,
    extra: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    for (key, value) in extra {
        defaults
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    defaults
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::SessionCapabilities;

    fn chrome_identity() -> Identity {
        Identity::resolve(
            &SessionCapabilities::new()
                .with_browser("chrome")
                .with_log_name("Nightly Run"),
        )
        .unwrap()
    }

    #[test]
    fn default_template_renders_all_fields() {
        let format = ImageNameFormat::new();
        let name = format.format("home page", &chrome_identity(), 1366, 768, 2);
        assert_eq!(name, "homePage-chrome-1366x768-dpr-2.png");
    }

    #[test]
    fn formatting_is_idempotent() {
        let format = ImageNameFormat::new().with_variable("env", "staging");
        let id = chrome_identity();
        let first = format.format("checkout", &id, 1024, 768, 1);
        let second = format.format("checkout", &id, 1024, 768, 1);
        assert_eq!(first, second);
    }

    #[test]
    fn custom_variables_substitute() {
        let format = ImageNameFormat::new()
            .with_template("{env}-{tag}")
            .with_variable("env", "staging");
        let name = format.format("cart", &chrome_identity(), 800, 600, 1);
        assert_eq!(name, "staging-cart.png");
    }

    #[test]
    fn computed_defaults_win_over_custom_variables() {
        // A caller-supplied {width} must not mask the real capture width.
        let format = ImageNameFormat::new().with_variable("width", "999");
        let name = format.format("cart", &chrome_identity(), 1366, 768, 1);
        assert!(name.contains("1366x768"));
        assert!(!name.contains("999"));
    }

    #[test]
    fn unresolved_placeholders_stay_verbatim() {
        let format = ImageNameFormat::new().with_template("{tag}-{missingKey}");
        let name = format.format("cart", &chrome_identity(), 800, 600, 1);
        assert_eq!(name, "cart-{missingKey}.png");
    }

    #[test]
    fn repeated_placeholders_all_substitute() {
        let format = ImageNameFormat::new().with_template("{tag}/{tag}");
        let name = format.format("cart", &chrome_identity(), 800, 600, 1);
        assert_eq!(name, "cart/cart.png");
    }

    #[test]
    fn log_name_available_under_both_keys() {
        let format = ImageNameFormat::new().with_template("{logName}-{name}");
        let name = format.format("x", &chrome_identity(), 1, 1, 1);
        assert_eq!(name, "nightlyRun-nightlyRun.png");
    }

    #[test]
    fn overlay_defaults_first_argument_wins() {
        let mut defaults = BTreeMap::new();
        defaults.insert("width".to_string(), "1366".to_string());
        let mut extra = BTreeMap::new();
        extra.insert("width".to_string(), "999".to_string());
        extra.insert("env".to_string(), "ci".to_string());

        let merged = overlay_defaults(defaults, &extra);
        assert_eq!(merged.get("width").unwrap(), "1366");
        assert_eq!(merged.get("env").unwrap(), "ci");
    }
}
