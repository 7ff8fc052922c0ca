// Lenient timestamp parsing and calendar timestamp formatting

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};

/// Compact UTC form used by calendar consumers, e.g. 20240110T090000Z
pub const ICS_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Wall-clock forms produced by date-time pickers; interpreted in the caller's zone
const LOCAL_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a stored date or date-time string into an absolute instant.
///
/// Accepted inputs:
/// - RFC 3339 with an offset (`2024-01-10T09:00:00Z`, `2024-01-10T09:00:00.000+02:00`)
/// - offset-less date-times, read as wall-clock time in `tz`
/// - bare dates (`2024-01-10`), read as UTC midnight
///
/// Anything else yields `None`; callers treat that as an absent date.
pub fn parse_timestamp<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }

    for format in LOCAL_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return resolve_local(tz, &naive);
        }
    }

    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Resolve a wall-clock time in `tz` the way browsers do: a repeated time takes
/// its earlier instant, and a skipped time moves forward by the length of the gap.
pub(crate) fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: &NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(naive) {
        LocalResult::Single(at) | LocalResult::Ambiguous(at, _) => Some(at.with_timezone(&Utc)),
        LocalResult::None => {
            // Read the skipped time with the offset in force before the gap
            let before = naive.checked_sub_signed(TimeDelta::days(1))?;
            let offset = tz.offset_from_utc_datetime(&before).fix();
            let shift = TimeDelta::seconds(offset.local_minus_utc().into());
            let utc = naive.checked_sub_signed(shift)?;
            Some(Utc.from_utc_datetime(&utc))
        }
    }
}

/// Render an instant in the calendar timestamp format
pub fn format_ics(at: &DateTime<Utc>) -> String {
    at.format(ICS_TIMESTAMP_FORMAT).to_string()
}
