pub mod formatting;
pub mod thresholds;

pub use formatting::{format_bytes, format_percentage, usage_percent};
pub use thresholds::{HIGH_THRESHOLD, LOW_THRESHOLD, usage_style};
