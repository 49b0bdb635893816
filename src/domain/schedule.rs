//! Weekly schedule entries and time-of-day values.
//!
//! Times are kept as minutes since midnight so that interval math never
//! touches strings. `HH:mm` only appears at the edges (parsing user input,
//! rendering messages).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Names used when rendering a day number (1 = Monday).
const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Returned when a string is not a strict 24-hour `HH:mm` value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid time '{0}', expected HH:mm")]
pub struct TimeParseError(pub String);

/// A wall-clock time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    /// Last representable minute of a day.
    pub const MAX_MINUTES: u16 = 24 * 60 - 1;

    /// Build from hour and minute, rejecting out-of-range values.
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self((hour * 60 + minute) as u16))
        } else {
            None
        }
    }

    /// Build from minutes since midnight.
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes <= Self::MAX_MINUTES).then_some(Self(minutes))
    }

    /// Parse a strict `HH:mm` string. No leniency: `9:5`, `24:00` and
    /// `12:60` are all rejected.
    pub fn parse(input: &str) -> Result<Self, TimeParseError> {
        let err = || TimeParseError(input.to_string());
        let bytes = input.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(err());
        }

        let digit = |b: u8| -> Result<u32, TimeParseError> {
            if b.is_ascii_digit() {
                Ok(u32::from(b - b'0'))
            } else {
                Err(err())
            }
        };

        let hour = digit(bytes[0])? * 10 + digit(bytes[1])?;
        let minute = digit(bytes[3])? * 10 + digit(bytes[4])?;
        Self::from_hm(hour, minute).ok_or_else(err)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    pub fn minute(self) -> u16 {
        self.0 % 60
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<NaiveTime> for TimeOfDay {
    /// Truncates to the minute
    fn from(time: NaiveTime) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = TimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// How a reminder is delivered when its entry starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderMode {
    /// Desktop notification only
    Notification,
    /// Spoken reminder only
    Voice,
    /// Both, delivered independently
    Both,
}

impl ReminderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Notification => "notification",
            Self::Voice => "voice",
            Self::Both => "both",
        }
    }

    pub fn notifies(self) -> bool {
        matches!(self, Self::Notification | Self::Both)
    }

    pub fn speaks(self) -> bool {
        matches!(self, Self::Voice | Self::Both)
    }
}

impl FromStr for ReminderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notification" => Ok(Self::Notification),
            "voice" => Ok(Self::Voice),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown reminder mode: {other}")),
        }
    }
}

/// A recurring weekly commitment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Store-assigned identifier (0 until persisted)
    pub id: i64,

    /// Day of the week, 1 = Monday .. 7 = Sunday
    pub day_of_week: u8,

    /// Short label ("Gym", "Team standup")
    pub action_name: String,

    /// Optional purpose, empty when unset
    pub objective: String,

    /// Start of the half-open interval
    pub start: TimeOfDay,

    /// End of the half-open interval (exclusive)
    pub end: TimeOfDay,

    /// Delivery mode for the reminder
    pub reminder_mode: ReminderMode,

    /// Soft-delete flag
    pub active: bool,

    pub created_at: DateTime<Utc>,
}

impl ScheduleEntry {
    /// Create an unsaved, active entry
    pub fn new(
        day_of_week: u8,
        action_name: impl Into<String>,
        objective: impl Into<String>,
        start: TimeOfDay,
        end: TimeOfDay,
        reminder_mode: ReminderMode,
    ) -> Self {
        Self {
            id: 0,
            day_of_week,
            action_name: action_name.into(),
            objective: objective.into(),
            start,
            end,
            reminder_mode,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Whether this entry intersects the half-open interval `[start, end)`
    pub fn overlaps(&self, start: TimeOfDay, end: TimeOfDay) -> bool {
        intervals_overlap(self.start, self.end, start, end)
    }

    /// `name (HH:mm-HH:mm)`, used in conflict messages
    pub fn label(&self) -> String {
        format!("{} ({}-{})", self.action_name, self.start, self.end)
    }
}

/// A schedule change as entered by the user, before validation.
///
/// Times are still raw strings here; they only become [`TimeOfDay`] once
/// the validator accepts them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScheduleEntry {
    /// Set when editing an existing entry
    pub id: Option<i64>,
    pub day_of_week: u8,
    pub action_name: String,
    pub objective: String,
    pub start: String,
    pub end: String,
    pub reminder_mode: ReminderMode,
}

/// Half-open interval intersection: `[a_start, a_end)` vs `[b_start, b_end)`.
pub fn intervals_overlap(
    a_start: TimeOfDay,
    a_end: TimeOfDay,
    b_start: TimeOfDay,
    b_end: TimeOfDay,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Whether `day` is a valid day number (1..=7).
pub fn is_valid_day(day: u8) -> bool {
    (1..=7).contains(&day)
}

/// English day name for a day number, `None` when out of range.
pub fn day_name(day: u8) -> Option<&'static str> {
    if is_valid_day(day) {
        Some(DAY_NAMES[usize::from(day - 1)])
    } else {
        None
    }
}

/// Render every active entry grouped by day, for use as assistant context.
///
/// Entries are expected in `(day, start)` order, as the store returns them.
pub fn render_summary(entries: &[ScheduleEntry]) -> String {
    if entries.is_empty() {
        return "There are no scheduled activities.".to_string();
    }

    let mut summary = String::from("Weekly schedule:\n");
    let mut current_day = None;

    for entry in entries {
        if current_day != Some(entry.day_of_week) {
            current_day = Some(entry.day_of_week);
            let name = day_name(entry.day_of_week).unwrap_or("Unknown day");
            summary.push_str(&format!("{}:\n", name));
        }

        summary.push_str(&format!(
            "- {} to {}: {}",
            entry.start, entry.end, entry.action_name
        ));
        if !entry.objective.is_empty() {
            summary.push_str(&format!(" ({})", entry.objective));
        }
        summary.push('\n');
    }

    summary
}
