//! Human-readable number formatting for progress logs.

const SUFFIXES: [&str; 4] = ["", "k", "m", "b"];

/// Abbreviate a number with a thousands suffix, dropping trailing zeros.
///
/// `millify(1_234_567.0, 3)` is `"1.235m"`; `millify(75_000.0, 0)` is `"75k"`.
pub fn millify(n: f64, precision: usize) -> String {
    let magnitude = if n == 0.0 || !n.is_finite() {
        0
    } else {
        (n.abs().log10() / 3.0).floor().max(0.0) as usize
    };
    let idx = magnitude.min(SUFFIXES.len() - 1);
    let scaled = n / 10f64.powi(3 * idx as i32);

    let mut digits = format!("{:.*}", precision, scaled);
    if digits.contains('.') {
        let trimmed = digits.trim_end_matches('0').trim_end_matches('.').len();
        digits.truncate(trimmed);
    }
    if digits == "-0" {
        digits = "0".to_string();
    }
    format!("{}{}", digits, SUFFIXES[idx])
}

/// Format a completion ratio as a percentage with three decimals.
pub fn format_progress(ratio: f64) -> String {
    format!("{:.3}%", ratio * 100.0)
}

/// Completion ratio of destination rows over source rows.
///
/// `None` when the source total is unknown or zero.
pub fn progress_ratio(destination_total: i64, source_total: Option<i64>) -> Option<f64> {
    match source_total {
        Some(total) if total > 0 => Some(destination_total as f64 / total as f64),
        _ => None,
    }
}
