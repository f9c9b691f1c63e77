//! Due-time input parsing.
//!
//! Every accepted form resolves to a single absolute instant that is fixed
//! when the task is created:
//! - `--due "2026-10-18 14:30"` or an RFC 3339 timestamp
//! - `--date 2026-10-18` (23:59 local on that day)
//! - `--date 2026-10-18 --time 14:30`
//! - `--time 14:30` (today, local)
//! - `--in 45m`

use chrono::{
    DateTime, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};

use crate::error::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMATS: [&str; 2] = ["%H:%M", "%H:%M:%S"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Raw due-time inputs as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct DueInput {
    pub due: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub within: Option<String>,
}

impl DueInput {
    pub fn is_empty(&self) -> bool {
        self.due.is_none() && self.date.is_none() && self.time.is_none() && self.within.is_none()
    }

    /// Resolve to an absolute instant relative to `now`.
    ///
    /// Only one form may be used; `date` and `time` combine.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let forms = [
            self.due.is_some(),
            self.date.is_some() || self.time.is_some(),
            self.within.is_some(),
        ]
        .iter()
        .filter(|used| **used)
        .count();
        if forms > 1 {
            return Err(Error::InvalidArgument(
                "use only one of --due, --date/--time, --in".to_string(),
            ));
        }

        if let Some(raw) = self.due.as_deref() {
            return parse_datetime(raw).map(Some);
        }
        if let Some(raw) = self.within.as_deref() {
            let offset = parse_duration(raw)?;
            if offset <= Duration::zero() {
                return Err(Error::InvalidArgument(format!(
                    "--in must be positive, got '{raw}'"
                )));
            }
            return now
                .checked_add_signed(offset)
                .map(Some)
                .ok_or_else(|| Error::InvalidArgument(format!("--in '{raw}' is too far ahead")));
        }

        let date = self.date.as_deref().map(parse_date).transpose()?;
        let time = self.time.as_deref().map(parse_time).transpose()?;
        match (date, time) {
            (Some(date), Some(time)) => local_to_utc(date.and_time(time)).map(Some),
            (Some(date), None) => {
                let end_of_day = NaiveTime::from_hms_opt(23, 59, 0)
                    .ok_or_else(|| Error::OperationFailed("invalid end of day".to_string()))?;
                local_to_utc(date.and_time(end_of_day)).map(Some)
            }
            (None, Some(time)) => {
                let today = now.with_timezone(&Local).date_naive();
                local_to_utc(today.and_time(time)).map(Some)
            }
            (None, None) => Ok(None),
        }
    }
}

/// Parse a duration such as `30s`, `45m`, `2h`, `1d`, `1w`.
///
/// A bare number is read as minutes.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::InvalidArgument("Duration cannot be empty".to_string()));
    }

    let (num_str, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => (&s[..pos], s[pos..].trim()),
        None => (s, "m"),
    };

    let num: i64 = num_str
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("Invalid duration number: '{num_str}'")))?;

    let duration = match unit.to_lowercase().as_str() {
        "s" | "sec" | "second" | "seconds" => Duration::try_seconds(num),
        "m" | "min" | "minute" | "minutes" => Duration::try_minutes(num),
        "h" | "hr" | "hour" | "hours" => Duration::try_hours(num),
        "d" | "day" | "days" => Duration::try_days(num),
        "w" | "week" | "weeks" => Duration::try_weeks(num),
        _ => {
            return Err(Error::InvalidArgument(format!(
                "Invalid duration unit '{unit}'. Expected: s, m, h, d, w"
            )));
        }
    };

    duration.ok_or_else(|| Error::InvalidArgument(format!("Duration out of range: '{s}'")))
}

/// Parse an absolute due time: RFC 3339, or a local `YYYY-MM-DD HH:MM[:SS]`.
pub fn parse_datetime(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return local_to_utc(naive);
        }
    }
    Err(Error::InvalidArgument(format!(
        "invalid due time '{raw}' (expected RFC 3339 or YYYY-MM-DD HH:MM)"
    )))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
        Error::InvalidArgument(format!("invalid date '{raw}' (expected YYYY-MM-DD)"))
    })
}

fn parse_time(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| Error::InvalidArgument(format!("invalid time '{raw}' (expected HH:MM)")))
}

fn local_to_utc(naive: NaiveDateTime) -> Result<DateTime<Utc>> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(local) => Ok(local.with_timezone(&Utc)),
        // Fall-back transition: take the earlier instant.
        LocalResult::Ambiguous(earlier, _) => Ok(earlier.with_timezone(&Utc)),
        LocalResult::None => Err(Error::InvalidArgument(format!(
            "local time {naive} does not exist (DST gap)"
        ))),
    }
}
