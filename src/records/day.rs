//! Calendar-day arithmetic in the configured local zone.

use std::fmt;

use chrono::{
    DateTime, FixedOffset, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeDelta, TimeZone, Utc,
};

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// The zone whose midnights delimit calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalZone {
    /// The host's zone, offset resolved per instant (follows daylight saving).
    System,
    /// An explicit offset that never changes.
    Fixed(FixedOffset),
}

impl LocalZone {
    pub fn window(&self, instant: DateTime<Utc>) -> DayWindow {
        match self {
            LocalZone::System => DayWindow::containing(instant, &Local),
            LocalZone::Fixed(offset) => DayWindow::containing(instant, offset),
        }
    }

    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self {
            LocalZone::System => local_to_utc(local, &Local),
            LocalZone::Fixed(offset) => local_to_utc(local, offset),
        }
    }
}

impl fmt::Display for LocalZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalZone::System => f.write_str("system"),
            LocalZone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

/// The half-open interval `[start, end)` covering one local calendar day.
/// Days around a daylight saving change last 23 or 25 hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub day: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// The day in `tz` that `instant` falls on.
    pub fn containing<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> Self {
        let day = instant.with_timezone(tz).date_naive();
        let start = local_to_utc(day.and_time(NaiveTime::MIN), tz);
        let end = match day.succ_opt() {
            Some(next) => local_to_utc(next.and_time(NaiveTime::MIN), tz),
            None => start + TimeDelta::days(1),
        };
        Self { day, start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Parses a submitted `recordedAt`.
///
/// RFC 3339 timestamps keep their own offset and date-times without an
/// offset are local to `zone`. A bare `YYYY-MM-DD` is UTC midnight, so a
/// stored value cut back to its first ten characters names the same date.
pub fn parse_recorded_at(raw: &str, zone: LocalZone) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(zone.to_utc(naive));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

fn local_to_utc<Tz: TimeZone>(local: NaiveDateTime, tz: &Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // Skipped by a forward clock change.
        LocalResult::None => {
            let offset = tz.offset_from_utc_datetime(&local).fix();
            (local - TimeDelta::seconds(i64::from(offset.local_minus_utc()))).and_utc()
        }
    }
}
