//! almex - Ambient assistant core
//!
//! Two always-on background loops give the assistant its ambient
//! character:
//! - an audio activation pipeline that waits for a wake condition, captures
//!   a command window and hands it to transcription and chat services
//! - a reminder engine that polls the weekly schedule and fires
//!   notifications and spoken reminders at each entry's start minute
//!
//! # Modules
//!
//! - `adapters`: External collaborators (Groq, desktop notifications, TTS)
//! - `audio`: Microphone capture, WAV encoding, wake lock
//! - `core`: Validator, reminder engine, activation pipeline, host
//! - `domain`: Data structures (ScheduleEntry, TimeOfDay, ConversationTurn)
//! - `store`: SQLite persistence
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Add a weekly entry
//! almex schedule add Gym --day 1 --start 07:00 --end 08:00 --mode voice
//!
//! # Run the listener and reminders
//! almex run
//! ```

pub mod adapters;
pub mod audio;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod store;

// Re-export main types at crate root for convenience
pub use crate::core::{AmbientHost, HostHandle, Listener, ReminderEngine, ScheduleService};
pub use domain::{ReminderMode, ScheduleEntry, TimeOfDay};
pub use store::{ConversationStore, ScheduleStore, SqliteStore};
