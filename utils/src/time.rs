//! Countdown formatting.

/// Render remaining seconds as `m:ss`, or `h:mm:ss` past an hour.
pub fn format_countdown(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats() {
        assert_eq!(format_countdown(0), "0:00");
        assert_eq!(format_countdown(59), "0:59");
        assert_eq!(format_countdown(180), "3:00");
        assert_eq!(format_countdown(1799), "29:59");
        assert_eq!(format_countdown(3661), "1:01:01");
    }
}
