//! Human-readable time formatting
//!
//! Playback clocks are shown as `M:SS` (minutes are not wrapped into hours,
//! a 75 minute sequence renders as `75:00`).

/// Format seconds as a playback clock (`M:SS`).
///
/// Fractional seconds are truncated, negative and non-finite values render
/// as `0:00`.
///
/// # Examples
///
/// ```
/// use vseq_common::human_time::format_clock;
///
/// assert_eq!(format_clock(0.0), "0:00");
/// assert_eq!(format_clock(9.9), "0:09");
/// assert_eq!(format_clock(75.0), "1:15");
/// assert_eq!(format_clock(3600.0), "60:00");
/// ```
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }

    let whole = seconds.floor() as u64;
    let minutes = whole / 60;
    let secs = whole % 60;
    format!("{}:{:02}", minutes, secs)
}

/// Format an elapsed/total pair as `M:SS / M:SS`.
///
/// ```
/// use vseq_common::human_time::format_clock_pair;
///
/// assert_eq!(format_clock_pair(12.4, 45.0), "0:12 / 0:45");
/// ```
pub fn format_clock_pair(elapsed: f64, total: f64) -> String {
    format!("{} / {}", format_clock(elapsed), format_clock(total))
}

/// Format a percentage rounded to the nearest whole number (`NN%`).
pub fn format_percent(percent: f64) -> String {
    if !percent.is_finite() {
        return "0%".to_string();
    }
    format!("{}%", percent.clamp(0.0, 100.0).round() as u32)
}
