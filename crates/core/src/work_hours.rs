//! Opening-hours evaluation in Bali local time.
//!
//! Bali runs on a fixed UTC+8 offset with no daylight saving, so every
//! evaluation converts the supplied instant with a [`FixedOffset`] instead of
//! consulting the host timezone. Intervals are half-open: a place with
//! `09:00-18:00` is open at `17:59` and closed at `18:00`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Offset of Bali local time (WITA) from UTC, in seconds.
pub const REGION_UTC_OFFSET_SECS: i32 = 8 * 60 * 60;

/// Minutes in a day; also the value of a `24:00` close time.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// The fixed region offset.
pub fn region_offset() -> FixedOffset {
    FixedOffset::east_opt(REGION_UTC_OFFSET_SECS).expect("UTC+8 is a valid offset")
}

/// Convert an instant to Bali wall-clock time.
pub fn to_region_time(now: DateTime<Utc>) -> DateTime<FixedOffset> {
    now.with_timezone(&region_offset())
}

// ---------------------------------------------------------------------------
// Day of week
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// Monday-first ordering used for display and histogram indexing.
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn index_from_monday(self) -> usize {
        self as usize
    }

    /// Day `days` after this one, wrapping around the week.
    pub fn plus_days(self, days: usize) -> DayOfWeek {
        Self::ALL[(self.index_from_monday() + days) % 7]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }

    pub fn short_label(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Mon",
            DayOfWeek::Tuesday => "Tue",
            DayOfWeek::Wednesday => "Wed",
            DayOfWeek::Thursday => "Thu",
            DayOfWeek::Friday => "Fri",
            DayOfWeek::Saturday => "Sat",
            DayOfWeek::Sunday => "Sun",
        }
    }

    /// Parse a day name as it appears in scraped data.
    ///
    /// Accepts English full and abbreviated names plus the Russian and
    /// Indonesian full names found in exported histograms. Case-insensitive.
    pub fn parse_name(name: &str) -> Option<DayOfWeek> {
        let lower = name.trim().to_lowercase();
        let day = match lower.as_str() {
            "monday" | "mon" | "mo" | "понедельник" | "senin" => DayOfWeek::Monday,
            "tuesday" | "tue" | "tues" | "tu" | "вторник" | "selasa" => DayOfWeek::Tuesday,
            "wednesday" | "wed" | "we" | "среда" | "rabu" => DayOfWeek::Wednesday,
            "thursday" | "thu" | "thurs" | "th" | "четверг" | "kamis" => DayOfWeek::Thursday,
            "friday" | "fri" | "fr" | "пятница" | "jumat" | "jum'at" => DayOfWeek::Friday,
            "saturday" | "sat" | "sa" | "суббота" | "sabtu" => DayOfWeek::Saturday,
            "sunday" | "sun" | "su" | "воскресенье" | "minggu" => DayOfWeek::Sunday,
            _ => return None,
        };
        Some(day)
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        DayOfWeek::ALL[day.num_days_from_monday() as usize]
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Schedule types
// ---------------------------------------------------------------------------

/// Hours for a single day. `open`/`close` are `HH:MM` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    #[serde(default)]
    pub open: String,
    #[serde(default)]
    pub close: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub closed: bool,
}

impl DayHours {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
            closed: false,
        }
    }

    pub fn closed() -> Self {
        Self {
            open: String::new(),
            close: String::new(),
            closed: true,
        }
    }

    /// Open and close as minutes since midnight.
    ///
    /// A close time at or before the open time is clipped to midnight, so an
    /// overnight range only counts the part that falls on its own day.
    pub fn minutes(&self) -> Result<(u16, u16), CoreError> {
        let open = parse_hhmm(&self.open)?;
        let close = parse_hhmm(&self.close)?;
        if close <= open {
            return Ok((open, MINUTES_PER_DAY));
        }
        Ok((open, close))
    }
}

/// Weekly schedule keyed by day. Days absent from the map are closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkHours(BTreeMap<DayOfWeek, DayHours>);

impl WorkHours {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mon-Sat 09:00-18:00, Sun 10:00-16:00. Used to pre-fill new drafts.
    pub fn default_week() -> Self {
        let mut week = Self::new();
        for day in DayOfWeek::ALL {
            let hours = if day == DayOfWeek::Sunday {
                DayHours::new("10:00", "16:00")
            } else {
                DayHours::new("09:00", "18:00")
            };
            week.insert(day, hours);
        }
        week
    }

    pub fn insert(&mut self, day: DayOfWeek, hours: DayHours) {
        self.0.insert(day, hours);
    }

    pub fn get(&self, day: DayOfWeek) -> Option<&DayHours> {
        self.0.get(&day)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DayOfWeek, &DayHours)> {
        self.0.iter()
    }

    /// Fill every day missing from the schedule with the default week.
    pub fn with_default_days(mut self) -> Self {
        for (day, hours) in Self::default_week().0 {
            self.0.entry(day).or_insert(hours);
        }
        self
    }

    /// Check every non-closed day has well-formed times.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (day, hours) in &self.0 {
            if hours.closed {
                continue;
            }
            hours
                .minutes()
                .map_err(|e| CoreError::Validation(format!("{day}: {e}")))?;
        }
        Ok(())
    }

    /// Leniently read a schedule from any of the stored shapes.
    ///
    /// Accepted: an object keyed by day name whose values are `{open, close,
    /// closed?}` objects or free-text hours, a `[{day, hours}]` array as
    /// exported by the maps scraper, or a JSON string holding either. Entries
    /// that cannot be read are skipped. Returns `None` when nothing usable
    /// remains.
    pub fn from_value(value: &Value) -> Option<WorkHours> {
        let mut hours = WorkHours::new();
        match value {
            Value::Object(map) => {
                for (key, entry) in map {
                    let Some(day) = DayOfWeek::parse_name(key) else {
                        continue;
                    };
                    if let Some(day_hours) = day_hours_from_value(entry) {
                        hours.insert(day, day_hours);
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    let day = item
                        .get("day")
                        .and_then(Value::as_str)
                        .and_then(DayOfWeek::parse_name);
                    let day_hours = item.get("hours").and_then(day_hours_from_value);
                    if let (Some(day), Some(day_hours)) = (day, day_hours) {
                        hours.insert(day, day_hours);
                    }
                }
            }
            Value::String(text) => {
                return match serde_json::from_str::<Value>(text) {
                    Ok(inner) if !inner.is_string() => Self::from_value(&inner),
                    _ => None,
                };
            }
            _ => return None,
        }
        (!hours.is_empty()).then_some(hours)
    }
}

fn day_hours_from_value(entry: &Value) -> Option<DayHours> {
    match entry {
        Value::Object(_) => serde_json::from_value::<DayHours>(entry.clone()).ok(),
        Value::String(text) => parse_hours_text(text),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Time parsing
// ---------------------------------------------------------------------------

/// Parse an `HH:MM` string into minutes since midnight. `24:00` is allowed.
pub fn parse_hhmm(value: &str) -> Result<u16, CoreError> {
    let invalid = || CoreError::Validation(format!("invalid time '{value}', expected HH:MM"));
    let (h, m) = value.trim().split_once(':').ok_or_else(invalid)?;
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(h) || h.len() > 2 || !digits(m) || m.len() != 2 {
        return Err(invalid());
    }
    let hours: u16 = h.parse().map_err(|_| invalid())?;
    let minutes: u16 = m.parse().map_err(|_| invalid())?;
    if minutes >= 60 || hours > 24 || (hours == 24 && minutes > 0) {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

pub fn format_hhmm(minutes: u16) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,2})(?:[:.](\d{2}))?\s*(am|pm)?$").expect("valid regex")
});

static RANGE_SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(?:\x{2013}|\x{2014}|-|\bto\b)\s*").expect("valid regex")
});

/// Parse free-text hours such as `"9 AM to 5 PM"`, `"Closed"` or
/// `"Open 24 hours"`.
///
/// Split shifts (`"7 AM to 3 PM, 5 to 10 PM"`) collapse to their outer
/// envelope. A close time of midnight becomes `24:00`.
pub fn parse_hours_text(text: &str) -> Option<DayHours> {
    let cleaned = text.replace(['\u{202f}', '\u{a0}'], " ");
    let lower = cleaned.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    if matches!(lower.as_str(), "closed" | "выходной" | "закрыто" | "tutup") {
        return Some(DayHours::closed());
    }
    if lower.contains("24 hours") || lower.contains("круглосуточно") || lower == "24/7" {
        return Some(DayHours::new("00:00", "24:00"));
    }

    let shifts: Vec<&str> = lower
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let (first_open, first_close) = split_range(shifts.first()?)?;
    let (_, last_close) = split_range(shifts.last()?)?;

    let first_close_meridiem = meridiem(first_close);
    let open = parse_clock(first_open, first_close_meridiem)?;
    let close = match parse_clock(last_close, None)? {
        0 => MINUTES_PER_DAY,
        minutes => minutes,
    };
    Some(DayHours::new(format_hhmm(open), format_hhmm(close)))
}

fn split_range(text: &str) -> Option<(&str, &str)> {
    let mut parts = RANGE_SEPARATOR_RE.splitn(text, 2);
    let open = parts.next()?.trim();
    let close = parts.next()?.trim();
    (!open.is_empty() && !close.is_empty()).then_some((open, close))
}

fn meridiem(text: &str) -> Option<&str> {
    CLOCK_RE
        .captures(text.trim())
        .and_then(|caps| caps.get(3))
        .map(|m| m.as_str())
}

/// Parse a 12h or 24h clock reading. A reading without a meridiem inherits
/// `fallback`, matching how exports write `"5 to 10 PM"`.
fn parse_clock(text: &str, fallback: Option<&str>) -> Option<u16> {
    let caps = CLOCK_RE.captures(text.trim())?;
    let hour: u16 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u16 = caps
        .get(2)
        .map(|m| m.as_str().parse().ok())
        .unwrap_or(Some(0))?;
    if minute >= 60 {
        return None;
    }
    let suffix = caps
        .get(3)
        .map(|m| m.as_str().to_lowercase())
        .or_else(|| fallback.map(str::to_lowercase));
    let hour = match suffix.as_deref() {
        Some("am") if hour <= 12 => hour % 12,
        Some("pm") if hour <= 12 => hour % 12 + 12,
        Some(_) => return None,
        None if hour <= 24 => hour,
        None => return None,
    };
    let minutes = hour * 60 + minute;
    (minutes <= MINUTES_PER_DAY).then_some(minutes)
}

// ---------------------------------------------------------------------------
// Open status
// ---------------------------------------------------------------------------

/// Result of evaluating a schedule at an instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OpenStatus {
    OpenUntil { close: String },
    /// Next opening within the coming week.
    ClosedUntil { day: DayOfWeek, time: String },
    Closed,
}

impl OpenStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, OpenStatus::OpenUntil { .. })
    }
}

impl fmt::Display for OpenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenStatus::OpenUntil { close } => write!(f, "Open until {close}"),
            OpenStatus::ClosedUntil { time, .. } => write!(f, "Closed until {time}"),
            OpenStatus::Closed => f.write_str("Closed"),
        }
    }
}

/// Evaluate a schedule at `now`.
///
/// Returns `Ok(None)` when there is no schedule to evaluate. A malformed time
/// string on a day that has to be inspected is a validation error.
pub fn open_status(
    schedule: Option<&WorkHours>,
    now: DateTime<Utc>,
) -> Result<Option<OpenStatus>, CoreError> {
    let Some(schedule) = schedule.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let local = to_region_time(now);
    let today = DayOfWeek::from(local.weekday());
    let minute_of_day = (local.hour() * 60 + local.minute()) as u16;

    if let Some(hours) = schedule.get(today).filter(|h| !h.closed) {
        let (open, close) = hours.minutes()?;
        if open <= minute_of_day && minute_of_day < close {
            return Ok(Some(OpenStatus::OpenUntil {
                close: hours.close.clone(),
            }));
        }
        if minute_of_day < open {
            return Ok(Some(OpenStatus::ClosedUntil {
                day: today,
                time: hours.open.clone(),
            }));
        }
    }

    for offset in 1..=7 {
        let day = today.plus_days(offset);
        if let Some(hours) = schedule.get(day).filter(|h| !h.closed) {
            parse_hhmm(&hours.open)?;
            return Ok(Some(OpenStatus::ClosedUntil {
                day,
                time: hours.open.clone(),
            }));
        }
    }

    Ok(Some(OpenStatus::Closed))
}

/// Whether the schedule is open at `now`; `None` when there is no schedule.
pub fn is_open_now(
    schedule: Option<&WorkHours>,
    now: DateTime<Utc>,
) -> Result<Option<bool>, CoreError> {
    Ok(open_status(schedule, now)?.map(|status| status.is_open()))
}

/// Render the week Monday-first as `(day, "09:00 - 18:00" | "Closed")`.
pub fn format_week(schedule: &WorkHours) -> Vec<(DayOfWeek, String)> {
    DayOfWeek::ALL
        .iter()
        .map(|&day| {
            let text = match schedule.get(day) {
                Some(hours) if !hours.closed => format!("{} - {}", hours.open, hours.close),
                _ => "Closed".to_string(),
            };
            (day, text)
        })
        .collect()
}
