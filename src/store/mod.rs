//! Persistence for schedules and conversation history.
//!
//! The core only talks to the [`ScheduleStore`] and [`ConversationStore`]
//! traits; [`SqliteStore`] is the production implementation backed by a
//! single SQLite file.

pub mod migrations;
pub mod sqlite;

use thiserror::Error;

use crate::domain::{ConversationTurn, ScheduleEntry, TimeOfDay};

pub use sqlite::SqliteStore;

/// Errors raised by a store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database schema version {db_version} is newer than supported version {latest_supported}")]
    UnsupportedSchemaVersion { db_version: u32, latest_supported: u32 },

    #[error("Schedule entry not found: {0}")]
    NotFound(i64),

    #[error("Invalid persisted data: {0}")]
    InvalidData(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Read/write access to the weekly schedule.
///
/// Only active entries are ever returned; deactivated entries are invisible
/// to every query.
pub trait ScheduleStore: Send + Sync {
    /// Active entries for one day, ordered by start time
    fn active_entries_for_day(&self, day: u8) -> Result<Vec<ScheduleEntry>, StoreError>;

    /// All active entries, ordered by day then start time
    fn all_active_entries(&self) -> Result<Vec<ScheduleEntry>, StoreError>;

    /// Active entries on `day` whose interval intersects `[start, end)`,
    /// skipping `exclude_id` (the entry being edited).
    fn find_conflicts(
        &self,
        day: u8,
        start: TimeOfDay,
        end: TimeOfDay,
        exclude_id: Option<i64>,
    ) -> Result<Vec<ScheduleEntry>, StoreError> {
        Ok(self
            .active_entries_for_day(day)?
            .into_iter()
            .filter(|entry| Some(entry.id) != exclude_id && entry.overlaps(start, end))
            .collect())
    }

    /// Insert a new entry, returning its id
    fn insert(&self, entry: &ScheduleEntry) -> Result<i64, StoreError>;

    /// Overwrite an active entry by id. Deactivated entries are not
    /// touched and report `NotFound`.
    fn update(&self, entry: &ScheduleEntry) -> Result<(), StoreError>;

    /// Soft-delete an entry
    fn deactivate(&self, id: i64) -> Result<(), StoreError>;
}

/// Storage for past voice exchanges.
pub trait ConversationStore: Send + Sync {
    /// Append an exchange, pruning history beyond the retention limit
    fn save_turn(
        &self,
        user_message: &str,
        assistant_response: &str,
        summary: &str,
    ) -> Result<i64, StoreError>;

    /// Summaries of the most recent exchanges, newest first
    fn recent_summaries(&self, limit: usize) -> Result<Vec<String>, StoreError>;

    /// Most recent exchanges, newest first
    fn recent_turns(&self, limit: usize) -> Result<Vec<ConversationTurn>, StoreError>;
}
