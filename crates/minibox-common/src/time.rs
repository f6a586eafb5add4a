//! Local-time timestamps and uptime formatting.

use chrono::{Local, NaiveDateTime};

use crate::constants::TIMESTAMP_FORMAT;

/// Returns the current local time as `YYYY-MM-DDTHH:MM:SS`.
#[must_use]
pub fn current_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a stored timestamp.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
}

/// Formats the time between `start` and `end` (or now) as `HH:MM:SS`.
///
/// Unparseable timestamps yield `--:--:--`; a negative span (clock moved
/// backwards) is clamped to zero.
#[must_use]
pub fn elapsed_duration(start: &str, end: Option<&str>) -> String {
    let Some(start) = parse_timestamp(start) else {
        return "--:--:--".into();
    };
    let end = match end {
        Some(end) => match parse_timestamp(end) {
            Some(end) => end,
            None => return "--:--:--".into(),
        },
        None => Local::now().naive_local(),
    };
    format_duration((end - start).num_seconds())
}

/// Formats a number of seconds as `HH:MM:SS`. Hours are not wrapped.
#[must_use]
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_timestamp_round_trips_through_parser() {
        let now = current_timestamp();
        assert_eq!(now.len(), 19);
        assert!(parse_timestamp(&now).is_some());
    }

    #[test]
    fn elapsed_between_two_stamps() {
        let span = elapsed_duration("2026-01-01T10:00:00", Some("2026-01-01T11:02:03"));
        assert_eq!(span, "01:02:03");
    }

    #[test]
    fn elapsed_over_a_day_keeps_counting_hours() {
        let span = elapsed_duration("2026-01-01T00:00:00", Some("2026-01-03T00:00:01"));
        assert_eq!(span, "48:00:01");
    }

    #[test]
    fn elapsed_with_garbage_is_placeholder() {
        assert_eq!(elapsed_duration("yesterday", None), "--:--:--");
        assert_eq!(
            elapsed_duration("2026-01-01T00:00:00", Some("later")),
            "--:--:--"
        );
    }

    #[test]
    fn negative_span_clamps_to_zero() {
        assert_eq!(format_duration(-5), "00:00:00");
    }
}
