// wwwidget-widgets/src/common/thresholds.rs
use wwwidget_core::Style;

/// Threshold constants for usage-based styling
pub const LOW_THRESHOLD: f64 = 60.0;
pub const HIGH_THRESHOLD: f64 = 80.0;

/// Get the text style for a usage percentage
///
/// # Arguments
/// * `percentage` - Usage percentage (0.0 - 100.0)
///
/// # Returns
/// Style based on thresholds:
/// - plain: < 60%
/// - Bold: 60% - 80%
/// - Reverse: >= 80%
pub fn usage_style(percentage: f64) -> Style {
    if percentage < LOW_THRESHOLD {
        Style::empty()
    } else if percentage < HIGH_THRESHOLD {
        Style::BOLD
    } else {
        Style::REVERSE
    }
}
