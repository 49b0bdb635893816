//! Schedule validation gate.
//!
//! Every create or edit passes through [`OverlapValidator::validate`]
//! before anything is written. Validation itself never writes.

use thiserror::Error;

use crate::domain::{intervals_overlap, ScheduleEntry, TimeOfDay, TimeParseError};
use crate::store::{ScheduleStore, StoreError};

/// Half-open overlap between two entries' intervals
pub fn overlaps(a: &ScheduleEntry, b: &ScheduleEntry) -> bool {
    intervals_overlap(a.start, a.end, b.start, b.end)
}

/// Strict 24-hour `HH:mm` parsing
pub fn parse_time(input: &str) -> Result<TimeOfDay, TimeParseError> {
    TimeOfDay::parse(input)
}

/// Outcome of validating a proposed interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid { start: TimeOfDay, end: TimeOfDay },
    /// The offending input string
    InvalidFormat(String),
    InvalidRange { start: TimeOfDay, end: TimeOfDay },
    /// Every active entry the interval would overlap
    Conflict(Vec<ScheduleEntry>),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Convert into the parsed interval or a reportable error
    pub fn into_result(self) -> Result<(TimeOfDay, TimeOfDay), ValidationError> {
        match self {
            Self::Valid { start, end } => Ok((start, end)),
            Self::InvalidFormat(input) => Err(ValidationError::InvalidFormat(input)),
            Self::InvalidRange { start, end } => Err(ValidationError::InvalidRange { start, end }),
            Self::Conflict(entries) => Err(ValidationError::Conflict(entries)),
        }
    }
}

/// A rejected schedule change, reported to the caller and never retried
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid time format '{0}', expected HH:mm")]
    InvalidFormat(String),

    #[error("Start time {start} must be before end time {end}")]
    InvalidRange { start: TimeOfDay, end: TimeOfDay },

    #[error("Schedule overlaps with: {}", conflict_labels(.0))]
    Conflict(Vec<ScheduleEntry>),
}

fn conflict_labels(entries: &[ScheduleEntry]) -> String {
    entries
        .iter()
        .map(ScheduleEntry::label)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Checks proposed intervals against the active schedule
pub struct OverlapValidator<'a> {
    store: &'a dyn ScheduleStore,
}

impl<'a> OverlapValidator<'a> {
    pub fn new(store: &'a dyn ScheduleStore) -> Self {
        Self { store }
    }

    /// Validate `[start, end)` on `day`.
    ///
    /// `exclude_id` names the entry being edited so it does not conflict
    /// with itself. Only store failures are errors; every rejection is a
    /// [`Validation`] variant.
    pub fn validate(
        &self,
        day: u8,
        start: &str,
        end: &str,
        exclude_id: Option<i64>,
    ) -> Result<Validation, StoreError> {
        let start = match parse_time(start) {
            Ok(t) => t,
            Err(e) => return Ok(Validation::InvalidFormat(e.0)),
        };
        let end = match parse_time(end) {
            Ok(t) => t,
            Err(e) => return Ok(Validation::InvalidFormat(e.0)),
        };

        if start >= end {
            return Ok(Validation::InvalidRange { start, end });
        }

        let conflicts = self.store.find_conflicts(day, start, end, exclude_id)?;
        if conflicts.is_empty() {
            Ok(Validation::Valid { start, end })
        } else {
            tracing::debug!(day, %start, %end, count = conflicts.len(), "Schedule conflict");
            Ok(Validation::Conflict(conflicts))
        }
    }
}
