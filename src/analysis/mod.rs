//! Report generators over already-fetched Travis data.
//!
//! Everything in here is synchronous and pure: callers fetch builds and
//! logs, these functions turn them into plain-text reports.

mod build_insights;
mod format;
mod optimization;
mod patterns;

pub use build_insights::{build_insights_report, DEFAULT_INSIGHTS_LIMIT, MAX_INSIGHTS_LIMIT};
pub use format::{format_duration, heavy_rule, state_glyph};
pub use optimization::{optimization_report, JobLog};
