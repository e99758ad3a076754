//! Display formatting for timestamps and durations. Pure string helpers the
//! presentation layer uses for markers, overlays, and the time-saved counter.

/// `HH:MM:SS` clock rendering for bookmark timestamps.
pub fn format_clock(total_secs: u32) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Compact humanization of the time-saved counter: seconds under a minute,
/// minutes and seconds under an hour, hours and minutes beyond.
pub fn format_time_saved(total_secs: f64) -> String {
    let total = total_secs.max(0.0) as u64;
    if total < 60 {
        format!("{total}s")
    } else if total < 3600 {
        format!("{}m {}s", total / 60, total % 60)
    } else {
        format!("{}h {}m", total / 3600, (total % 3600) / 60)
    }
}

/// Text for the remaining-time overlay: elapsed-style breakdown plus the
/// percentage of the video still ahead.
pub fn format_remaining_line(remaining_secs: f64, duration_secs: f64) -> String {
    let remaining = remaining_secs.max(0.0);
    let secs = remaining as u64;
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    let percent = if duration_secs > 0.0 {
        (remaining / duration_secs * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };
    format!("{hours} hour : {minutes} min : {seconds} sec | {percent:.1}% left")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_pads_every_field() {
        assert_eq!(format_clock(0), "00:00:00");
        assert_eq!(format_clock(90), "00:01:30");
        assert_eq!(format_clock(3661), "01:01:01");
    }

    #[test]
    fn time_saved_switches_units_at_the_breakpoints() {
        assert_eq!(format_time_saved(0.0), "0s");
        assert_eq!(format_time_saved(59.9), "59s");
        assert_eq!(format_time_saved(60.0), "1m 0s");
        assert_eq!(format_time_saved(3599.0), "59m 59s");
        assert_eq!(format_time_saved(3600.0), "1h 0m");
        assert_eq!(format_time_saved(7290.0), "2h 1m");
    }

    #[test]
    fn remaining_line_reports_percent_of_duration() {
        assert_eq!(
            format_remaining_line(200.0, 800.0),
            "0 hour : 3 min : 20 sec | 25.0% left"
        );
        assert_eq!(
            format_remaining_line(0.0, 0.0),
            "0 hour : 0 min : 0 sec | 0.0% left"
        );
    }
}
