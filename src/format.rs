//! Number formatting shared by suggestions and statistics.
//!
//! Rounding follows the log host's conventions: halves round towards
//! positive infinity, so `2.5` becomes `3` and `-2.5` becomes `-2`.

fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Round to an integer and group thousands with commas.
///
/// # Examples
///
/// ```rust
/// use combatlog::format::format_thousands;
///
/// assert_eq!(format_thousands(1234567.4), "1,234,567");
/// assert_eq!(format_thousands(999.5), "1,000");
/// assert_eq!(format_thousands(f64::NAN), "0");
/// ```
pub fn format_thousands(value: f64) -> String {
    let rounded = if value.is_finite() {
        round_half_up(value)
    } else {
        0.0
    };
    let digits = (rounded.abs() as u64).to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Abbreviate large numbers: `"2.50m"` above a million, `"15k"` above ten
/// thousand, thousands-grouped otherwise.
///
/// # Examples
///
/// ```rust
/// use combatlog::format::format_number;
///
/// assert_eq!(format_number(2_500_000.0), "2.50m");
/// assert_eq!(format_number(15_000.0), "15k");
/// assert_eq!(format_number(9_999.0), "9,999");
/// ```
pub fn format_number(value: f64) -> String {
    if value > 1_000_000.0 {
        format!("{:.2}m", round_half_up(value / 10_000.0) / 100.0)
    } else if value > 10_000.0 {
        format!("{}k", round_half_up(value / 1000.0) as i64)
    } else {
        format_thousands(value)
    }
}

/// Format a ratio as a percentage with two decimals, without the `%` sign.
///
/// ```rust
/// use combatlog::format::format_percentage;
///
/// assert_eq!(format_percentage(0.4567), "45.67");
/// ```
pub fn format_percentage(ratio: f64) -> String {
    format_percentage_with(ratio, 2)
}

/// [`format_percentage`] with an explicit number of decimals.
///
/// The ratio is rounded to two decimals of a percent first, then printed
/// with `precision` decimals.
pub fn format_percentage_with(ratio: f64, precision: usize) -> String {
    let ratio = if ratio.is_finite() { ratio } else { 0.0 };
    let percent = round_half_up(ratio * 10_000.0) / 100.0;
    format!("{:.*}", precision, percent)
}

/// Render a duration in seconds as `m:ss`.
///
/// ```rust
/// use combatlog::format::format_duration;
///
/// assert_eq!(format_duration(125.0), "2:05");
/// assert_eq!(format_duration(3600.0), "60:00");
/// ```
pub fn format_duration(seconds: f64) -> String {
    let seconds = if seconds.is_finite() {
        seconds.max(0.0)
    } else {
        0.0
    };
    let minutes = (seconds / 60.0).floor() as u64;
    let rest = (seconds % 60.0).floor() as u64;
    format!("{}:{:02}", minutes, rest)
}
