//! SQLite-backed implementation of the store traits.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::migrations::apply_migrations;
use super::{ConversationStore, ScheduleStore, StoreError};
use crate::domain::{ConversationTurn, ScheduleEntry, TimeOfDay};

/// Conversation rows kept after each insert
pub const CONVERSATION_RETENTION: usize = 50;

const SCHEDULE_SELECT_SQL: &str = "SELECT
    id,
    day_of_week,
    action_name,
    objective,
    start_minute,
    end_minute,
    reminder_mode,
    is_active,
    created_at
FROM schedules";

/// Store backed by a single SQLite connection
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply migrations
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "Opened schedule database");
        Self::bootstrap(conn)
    }

    /// Open a private in-memory database (tests, dry runs)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(mut conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn query_entries(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ScheduleEntry>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, ScheduleRow::from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.into_entry()?);
        }
        Ok(entries)
    }
}

impl ScheduleStore for SqliteStore {
    fn active_entries_for_day(&self, day: u8) -> Result<Vec<ScheduleEntry>, StoreError> {
        self.query_entries(
            &format!(
                "{SCHEDULE_SELECT_SQL} WHERE day_of_week = ?1 AND is_active = 1 ORDER BY start_minute ASC"
            ),
            params![day],
        )
    }

    fn all_active_entries(&self) -> Result<Vec<ScheduleEntry>, StoreError> {
        self.query_entries(
            &format!(
                "{SCHEDULE_SELECT_SQL} WHERE is_active = 1 ORDER BY day_of_week ASC, start_minute ASC"
            ),
            [],
        )
    }

    fn find_conflicts(
        &self,
        day: u8,
        start: TimeOfDay,
        end: TimeOfDay,
        exclude_id: Option<i64>,
    ) -> Result<Vec<ScheduleEntry>, StoreError> {
        self.query_entries(
            &format!(
                "{SCHEDULE_SELECT_SQL}
                 WHERE day_of_week = ?1
                   AND is_active = 1
                   AND id != ?2
                   AND start_minute < ?4
                   AND ?3 < end_minute
                 ORDER BY start_minute ASC"
            ),
            params![day, exclude_id.unwrap_or(-1), start.minutes(), end.minutes()],
        )
    }

    fn insert(&self, entry: &ScheduleEntry) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO schedules (
                day_of_week,
                action_name,
                objective,
                start_minute,
                end_minute,
                reminder_mode,
                is_active,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                entry.day_of_week,
                entry.action_name,
                entry.objective,
                entry.start.minutes(),
                entry.end.minutes(),
                entry.reminder_mode.as_str(),
                entry.active,
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update(&self, entry: &ScheduleEntry) -> Result<(), StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE schedules
             SET
                day_of_week = ?1,
                action_name = ?2,
                objective = ?3,
                start_minute = ?4,
                end_minute = ?5,
                reminder_mode = ?6
             WHERE id = ?7 AND is_active = 1;",
            params![
                entry.day_of_week,
                entry.action_name,
                entry.objective,
                entry.start.minutes(),
                entry.end.minutes(),
                entry.reminder_mode.as_str(),
                entry.id,
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(entry.id));
        }
        Ok(())
    }

    fn deactivate(&self, id: i64) -> Result<(), StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE schedules SET is_active = 0 WHERE id = ?1 AND is_active = 1;",
            params![id],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

impl ConversationStore for SqliteStore {
    fn save_turn(
        &self,
        user_message: &str,
        assistant_response: &str,
        summary: &str,
    ) -> Result<i64, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO conversations (timestamp, user_message, assistant_response, summary)
             VALUES (?1, ?2, ?3, ?4);",
            params![Utc::now().to_rfc3339(), user_message, assistant_response, summary],
        )?;
        let id = tx.last_insert_rowid();

        let pruned = tx.execute(
            "DELETE FROM conversations
             WHERE id NOT IN (SELECT id FROM conversations ORDER BY id DESC LIMIT ?1);",
            params![CONVERSATION_RETENTION as i64],
        )?;
        tx.commit()?;

        if pruned > 0 {
            tracing::debug!(pruned, "Pruned old conversation turns");
        }
        Ok(id)
    }

    fn recent_summaries(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT summary FROM conversations ORDER BY id DESC LIMIT ?1")?;
        let summaries = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    fn recent_turns(&self, limit: usize) -> Result<Vec<ConversationTurn>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, user_message, assistant_response, summary
             FROM conversations ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (id, timestamp, user_message, assistant_response, summary) = row?;
            turns.push(ConversationTurn {
                id,
                timestamp: parse_timestamp(&timestamp)?,
                user_message,
                assistant_response,
                summary,
            });
        }
        Ok(turns)
    }
}

/// Raw column values, converted to a domain entry after the row is read
struct ScheduleRow {
    id: i64,
    day_of_week: i64,
    action_name: String,
    objective: String,
    start_minute: i64,
    end_minute: i64,
    reminder_mode: String,
    is_active: bool,
    created_at: String,
}

impl ScheduleRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            day_of_week: row.get(1)?,
            action_name: row.get(2)?,
            objective: row.get(3)?,
            start_minute: row.get(4)?,
            end_minute: row.get(5)?,
            reminder_mode: row.get(6)?,
            is_active: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_entry(self) -> Result<ScheduleEntry, StoreError> {
        let day_of_week = u8::try_from(self.day_of_week)
            .ok()
            .filter(|d| crate::domain::is_valid_day(*d))
            .ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "schedule {} has day_of_week {}",
                    self.id, self.day_of_week
                ))
            })?;

        Ok(ScheduleEntry {
            id: self.id,
            day_of_week,
            action_name: self.action_name,
            objective: self.objective,
            start: minutes_to_time(self.id, self.start_minute)?,
            end: minutes_to_time(self.id, self.end_minute)?,
            reminder_mode: self.reminder_mode.parse().map_err(StoreError::InvalidData)?,
            active: self.is_active,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn minutes_to_time(id: i64, minutes: i64) -> Result<TimeOfDay, StoreError> {
    u16::try_from(minutes)
        .ok()
        .and_then(TimeOfDay::from_minutes)
        .ok_or_else(|| {
            StoreError::InvalidData(format!("schedule {id} has out-of-range minute {minutes}"))
        })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("bad timestamp '{value}': {e}")))
}
