//! Domain types for the assistant core.
//!
//! This module contains the plain data structures:
//! - Schedule: weekly entries, time-of-day values, reminder modes
//! - Conversation: stored voice exchanges and prompt context

pub mod conversation;
pub mod schedule;

// Re-export commonly used types
pub use conversation::{build_context, summarize, ConversationTurn};
pub use schedule::{
    day_name, intervals_overlap, is_valid_day, render_summary, NewScheduleEntry, ReminderMode,
    ScheduleEntry, TimeOfDay, TimeParseError,
};
