use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// A filename pattern: pure function from a capture to a date
struct DatePattern {
    name: &'static str,
    regex: &'static LazyLock<Regex>,
    parse: fn(&Captures) -> Option<NaiveDateTime>,
}

// Digit runs only; the boundary check happens in `is_bounded`.
static RE_DATETIME_SEP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{4})[-_]([0-9]{2})[-_]([0-9]{2})[-_]([0-9]{2})[-_]([0-9]{2})[-_]([0-9]{2})").unwrap()
});
static RE_DATE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{4})([0-9]{2})([0-9]{2})[-_]([0-9]{2})([0-9]{2})([0-9]{2})").unwrap()
});
static RE_DIGITS_14: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]{4})([0-9]{2})([0-9]{2})([0-9]{2})([0-9]{2})([0-9]{2})").unwrap());
static RE_DATE_SEP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]{4})[-_]([0-9]{2})[-_]([0-9]{2})").unwrap());
static RE_UNIX_MILLIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([0-9]{13})").unwrap());
static RE_UNIX_SECS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([0-9]{10})").unwrap());
static RE_DIGITS_8: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]{4})([0-9]{2})([0-9]{2})").unwrap());

/// Tried in order; the first plausible date wins.
static PATTERNS: &[DatePattern] = &[
    DatePattern { name: "YYYY-MM-DD-hh-mm-ss", regex: &RE_DATETIME_SEP, parse: datetime_from_groups },
    DatePattern { name: "YYYYMMDD_hhmmss", regex: &RE_DATE_TIME, parse: datetime_from_groups },
    DatePattern { name: "YYYYMMDDhhmmss", regex: &RE_DIGITS_14, parse: datetime_from_groups },
    DatePattern { name: "YYYY-MM-DD", regex: &RE_DATE_SEP, parse: date_from_groups },
    DatePattern { name: "unix-millis", regex: &RE_UNIX_MILLIS, parse: unix_millis },
    DatePattern { name: "unix-seconds", regex: &RE_UNIX_SECS, parse: unix_seconds },
    DatePattern { name: "YYYYMMDD", regex: &RE_DIGITS_8, parse: date_from_groups },
];

fn group(caps: &Captures, i: usize) -> Option<u32> {
    caps.get(i)?.as_str().parse().ok()
}

fn date_from_groups(caps: &Captures) -> Option<NaiveDateTime> {
    let year = caps.get(1)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, group(caps, 2)?, group(caps, 3)?)?.and_hms_opt(0, 0, 0)
}

fn datetime_from_groups(caps: &Captures) -> Option<NaiveDateTime> {
    let date = date_from_groups(caps)?.date();
    date.and_hms_opt(group(caps, 4)?, group(caps, 5)?, group(caps, 6)?)
}

// Timestamps are UTC; photos are filed by local calendar date
fn local_from_utc(utc: DateTime<Utc>) -> NaiveDateTime {
    utc.with_timezone(&Local).naive_local()
}

fn unix_millis(caps: &Captures) -> Option<NaiveDateTime> {
    let millis: i64 = caps.get(1)?.as_str().parse().ok()?;
    DateTime::from_timestamp_millis(millis).map(local_from_utc)
}

fn unix_seconds(caps: &Captures) -> Option<NaiveDateTime> {
    let secs: i64 = caps.get(1)?.as_str().parse().ok()?;
    DateTime::from_timestamp(secs, 0).map(local_from_utc)
}

/// A match must not be glued to more digits on either side.
fn is_bounded(haystack: &str, start: usize, end: usize) -> bool {
    let bytes = haystack.as_bytes();
    let digit_before = start > 0 && bytes[start - 1].is_ascii_digit();
    let digit_after = bytes.get(end).is_some_and(u8::is_ascii_digit);
    !digit_before && !digit_after
}

/// Guess a date from a base filename. `accept` filters out implausible
/// dates; a rejected match falls through to the next occurrence/pattern.
pub fn guess_date_from_filename(
    filename: &str,
    accept: impl Fn(&NaiveDateTime) -> bool,
) -> Option<(NaiveDateTime, &'static str)> {
    for pat in PATTERNS {
        // Restart one byte after each match start so occurrences sharing a
        // separator are all seen. Matches start on an ASCII digit.
        let mut from = 0;
        while let Some(caps) = pat.regex.captures_at(filename, from) {
            let Some(whole) = caps.get(0) else {
                break;
            };
            from = whole.start() + 1;
            if !is_bounded(filename, whole.start(), whole.end()) {
                continue;
            }
            if let Some(dt) = (pat.parse)(&caps) {
                if accept(&dt) {
                    return Some((dt, pat.name));
                }
            }
        }
    }

    None
}
