use std::fmt::Write;

/// Width of the section rules in every report.
pub const RULE_WIDTH: usize = 80;

pub fn heavy_rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn light_rule() -> String {
    "-".repeat(RULE_WIDTH)
}

/// Writes a blank line, the section title and a light rule.
pub fn add_section_header(output: &mut String, glyph: &str, title: &str) {
    let _ = writeln!(output);
    let _ = writeln!(output, "{glyph} {title}");
    let _ = writeln!(output, "{}", light_rule());
}

/// Percentage of `count` in `total`; zero when `total` is zero.
#[allow(clippy::cast_precision_loss)]
pub fn calculate_rate(count: usize, total: usize) -> f64 {
    if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

pub fn format_rate(rate: f64) -> String {
    format!("{rate:.1}%")
}

/// Renders seconds as `minutes:seconds` (e.g. 400 -> `6:40`).
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Status glyph for a build or job lifecycle state.
pub fn state_glyph(state: &str) -> &'static str {
    match state {
        "passed" => "✅",
        "failed" => "❌",
        "errored" => "⚠️",
        "canceled" => "🚫",
        "started" => "🔄",
        "created" | "received" | "queued" => "⏳",
        _ => "❓",
    }
}

/// Truncates to `max_chars` characters, appending `...` when anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_are_80_columns() {
        assert_eq!(heavy_rule().len(), 80);
        assert_eq!(light_rule().len(), 80);
        assert!(light_rule().chars().all(|c| c == '-'));
    }

    #[test]
    fn test_calculate_rate_zero_total() {
        assert_eq!(calculate_rate(3, 0), 0.0);
    }

    #[test]
    fn test_calculate_rate_fraction() {
        let rate = calculate_rate(1, 3);
        assert!((rate - 33.333_333).abs() < 0.001, "got {rate}");
    }

    #[test]
    fn test_format_rate_one_decimal() {
        assert_eq!(format_rate(calculate_rate(2, 3)), "66.7%");
        assert_eq!(format_rate(0.0), "0.0%");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(400), "6:40");
        assert_eq!(format_duration(3725), "62:05");
    }

    #[test]
    fn test_state_glyph_unknown() {
        assert_eq!(state_glyph("passed"), "✅");
        assert_eq!(state_glyph("something-new"), "❓");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 60), "short");
        let exact = "a".repeat(60);
        assert_eq!(truncate_chars(&exact, 60), exact);
        let long = "b".repeat(61);
        assert_eq!(truncate_chars(&long, 60), format!("{}...", "b".repeat(60)));
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        let text = "é".repeat(70);
        let truncated = truncate_chars(&text, 60);
        assert_eq!(truncated.chars().count(), 63);
    }
}
