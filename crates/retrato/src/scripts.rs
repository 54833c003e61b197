//! Page-side function contracts.
//!
//! Every measurement that has to happen inside the browser is expressed as a
//! self-contained JavaScript function literal taking only primitive,
//! serializable arguments. Nothing from the orchestrator is closed over; the
//! automation adapter serializes the function and its arguments across the
//! remote-execution boundary as-is.
//!
//! Element-position probes return `{x, y}` in CSS pixels, or `null` when the
//! selector matches nothing (mapped to an element-not-found error on the
//! Rust side).

/// Browser metrics probe.
///
/// Input: `(isMobile: bool)`. Output: `{pixelRatio, width, height,
/// innerHeight, pageWidth, pageHeight}` — screen size for mobile sessions,
/// outer window size for desktop, plus the full scrollable document size.
pub const BROWSER_METRICS: &str = "\
function (isMobile) {
    var html = document.documentElement;
    var body = document.body;
    return {
        pixelRatio: window.devicePixelRatio,
        width: isMobile ? window.screen.width : window.outerWidth,
        height: isMobile ? window.screen.height : window.outerHeight,
        innerHeight: window.innerHeight,
        pageWidth: Math.max(html.scrollWidth, body ? body.scrollWidth : 0),
        pageHeight: Math.max(html.scrollHeight, body ? body.scrollHeight : 0)
    };
}";

/// Viewport-relative element position probe.
///
/// Input: `(selector: string)`. Output: `{x, y}` from
/// `getBoundingClientRect`, or `null`.
pub const VIEWPORT_ELEMENT_POSITION: &str = "\
function (selector) {
    var element = document.querySelector(selector);
    if (!element) { return null; }
    var rect = element.getBoundingClientRect();
    return { x: rect.left, y: rect.top };
}";

/// iOS Safari element position probe.
///
/// Input: `(selector: string, statusBarHeight: number, addressBarHeight:
/// number)`. When the visible height equals the larger screen dimension the
/// OS chrome is collapsed and the viewport-relative top is used as-is;
/// otherwise the status and address bar heights are added. Output: `{x, y}`
/// or `null`.
pub const IOS_ELEMENT_POSITION: &str = "\
function (selector, statusBarHeight, addressBarHeight) {
    var element = document.querySelector(selector);
    if (!element) { return null; }
    var rect = element.getBoundingClientRect();
    var chromeCollapsed =
        window.innerHeight === Math.max(window.screen.height, window.screen.width);
    var offset = chromeCollapsed ? 0 : statusBarHeight + addressBarHeight;
    return { x: rect.left, y: offset + rect.top };
}";

/// Android native-screenshot element position probe.
///
/// Input: `(selector: string, statusBarHeight: number, addressBarHeight:
/// number, toolBarHeight: number)`. The status bar height is always added;
/// the address bar height only while it is visible (screen height equals the
/// sum of all chrome heights and the inner height). The tool bar height
/// never contributes to `y`. Output: `{x, y}` or `null`.
pub const ANDROID_ELEMENT_POSITION: &str = "\
function (selector, statusBarHeight, addressBarHeight, toolBarHeight) {
    var element = document.querySelector(selector);
    if (!element) { return null; }
    var rect = element.getBoundingClientRect();
    var addressBarVisible =
        window.screen.height ===
            statusBarHeight + addressBarHeight + toolBarHeight + window.innerHeight;
    return {
        x: rect.left,
        y: statusBarHeight + (addressBarVisible ? addressBarHeight : 0) + rect.top
    };
}";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_are_self_contained_function_literals() {
        for script in [
            BROWSER_METRICS,
            VIEWPORT_ELEMENT_POSITION,
            IOS_ELEMENT_POSITION,
            ANDROID_ELEMENT_POSITION,
        ] {
            assert!(script.starts_with("function ("));
            assert!(script.ends_with('}'));
        }
    }

    #[test]
    fn position_probes_guard_against_missing_elements() {
        for script in [
            VIEWPORT_ELEMENT_POSITION,
            IOS_ELEMENT_POSITION,
            ANDROID_ELEMENT_POSITION,
        ] {
            assert!(script.contains("return null"));
        }
    }
}
