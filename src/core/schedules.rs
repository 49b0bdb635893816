//! Validator-gated schedule management.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::{is_valid_day, render_summary, NewScheduleEntry, ScheduleEntry};
use crate::store::{ScheduleStore, StoreError};

use super::overlap::{OverlapValidator, Validation, ValidationError};

/// Why a schedule change was refused or could not be stored
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Day must be between 1 (Monday) and 7 (Sunday), got {0}")]
    InvalidDay(u8),

    #[error("Action name cannot be empty")]
    EmptyName,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The only write path to the schedule
#[derive(Clone)]
pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }

    /// Validate without persisting
    pub fn validate(
        &self,
        day: u8,
        start: &str,
        end: &str,
        exclude_id: Option<i64>,
    ) -> Result<Validation, StoreError> {
        OverlapValidator::new(self.store.as_ref()).validate(day, start, end, exclude_id)
    }

    /// Validate and persist. Inserts when `draft.id` is unset, otherwise
    /// updates that entry. Returns the entry id.
    pub fn save(&self, draft: NewScheduleEntry) -> Result<i64, ScheduleError> {
        if !is_valid_day(draft.day_of_week) {
            return Err(ScheduleError::InvalidDay(draft.day_of_week));
        }
        let action_name = draft.action_name.trim();
        if action_name.is_empty() {
            return Err(ScheduleError::EmptyName);
        }

        let (start, end) = self
            .validate(draft.day_of_week, &draft.start, &draft.end, draft.id)?
            .into_result()?;

        let mut entry = ScheduleEntry::new(
            draft.day_of_week,
            action_name,
            draft.objective.trim(),
            start,
            end,
            draft.reminder_mode,
        );

        match draft.id {
            Some(id) => {
                entry.id = id;
                self.store.update(&entry)?;
                tracing::info!(id, day = entry.day_of_week, "Schedule entry updated");
                Ok(id)
            }
            None => {
                let id = self.store.insert(&entry)?;
                tracing::info!(id, day = entry.day_of_week, "Schedule entry created");
                Ok(id)
            }
        }
    }

    /// Soft-delete an entry
    pub fn remove(&self, id: i64) -> Result<(), ScheduleError> {
        self.store.deactivate(id)?;
        tracing::info!(id, "Schedule entry deactivated");
        Ok(())
    }

    pub fn entries_for_day(&self, day: u8) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        if !is_valid_day(day) {
            return Err(ScheduleError::InvalidDay(day));
        }
        Ok(self.store.active_entries_for_day(day)?)
    }

    pub fn all(&self) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        Ok(self.store.all_active_entries()?)
    }

    /// Weekly summary in the form handed to the assistant
    pub fn summary(&self) -> Result<String, ScheduleError> {
        Ok(render_summary(&self.all()?))
    }
}
