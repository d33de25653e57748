// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared elapsed-time formatting for log lines.

use std::time::Duration;

/// Width of the elapsed field in a log prefix.
const PREFIX_WIDTH: usize = 10;

/// Format a duration truncated to millisecond precision: `"0ms"`,
/// `"15ms"`, `"1.234s"`, `"2m3.5s"`, `"1h2m3s"`.
///
/// Sub-second durations render in milliseconds; fractional seconds drop
/// trailing zeros.
pub fn format_duration_ms(d: Duration) -> String {
    let total_ms = d.as_millis() as u64;
    if total_ms < 1000 {
        return format!("{total_ms}ms");
    }
    let secs = total_ms / 1000;
    let ms = total_ms % 1000;
    if secs < 60 {
        return format!("{}s", seconds_field(secs, ms));
    }
    let mins = secs / 60;
    let rem_secs = secs % 60;
    if mins < 60 {
        return format!("{}m{}s", mins, seconds_field(rem_secs, ms));
    }
    format!(
        "{}h{}m{}s",
        mins / 60,
        mins % 60,
        seconds_field(rem_secs, ms)
    )
}

// Seconds with fractional millis, trailing zeros trimmed: "3", "1.2", "1.234".
fn seconds_field(secs: u64, ms: u64) -> String {
    if ms == 0 {
        return secs.to_string();
    }
    let padded = format!("{ms:03}");
    format!("{}.{}", secs, padded.trim_end_matches('0'))
}

/// The fixed-width log line prefix: the elapsed time right-justified to
/// ten characters, bracketed and followed by one space, e.g.
/// `"[    1.234s] "`.
pub fn log_prefix(elapsed: Duration) -> String {
    format!(
        "[{:>width$}] ",
        format_duration_ms(elapsed),
        width = PREFIX_WIDTH
    )
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
