//! Wall-clock stamps used in chat lines and the activity log.

use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;

/// Formats a time as `HH:mm` (24-hour clock).
pub fn hhmm<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%H:%M").to_string()
}

/// Current local time as `HH:mm`.
pub fn now_hhmm() -> String {
    hhmm(&Local::now())
}

/// Formats a time as `dd/MM/yy HH:mm`, the activity log banner stamp.
pub fn banner_stamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%d/%m/%y %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_hhmm_pads_hours_and_minutes() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 42).unwrap();
        assert_eq!(hhmm(&at), "07:05");
    }

    #[test]
    fn test_hhmm_uses_24_hour_clock() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 0).unwrap();
        assert_eq!(hhmm(&at), "23:59");
    }

    #[test]
    fn test_banner_stamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 0).unwrap();
        assert_eq!(banner_stamp(&at), "09/03/24 14:30");
    }

    #[test]
    fn test_now_hhmm_shape() {
        let stamp = now_hhmm();
        assert_eq!(stamp.len(), 5);
        assert_eq!(stamp.chars().nth(2), Some(':'));
    }
}
