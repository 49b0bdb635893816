//! Schedule management commands.
//!
//! - `almex schedule add` - Add an entry (validated against the week)
//! - `almex schedule edit` - Change an existing entry
//! - `almex schedule remove` - Deactivate an entry
//! - `almex schedule list|today|summary` - Inspect the schedule

use anyhow::{bail, Result};
use chrono::{Datelike, Local};
use clap::{Args, Subcommand, ValueEnum};

use crate::core::{ScheduleError, ScheduleService, ValidationError};
use crate::domain::{day_name, NewScheduleEntry, ReminderMode, ScheduleEntry};

/// Schedule subcommands
#[derive(Subcommand, Debug)]
pub enum ScheduleCommands {
    /// Add a weekly entry
    Add(EntryArgs),

    /// Edit an existing entry; omitted fields keep their value
    Edit {
        /// Entry ID
        id: i64,

        #[command(flatten)]
        changes: EditArgs,
    },

    /// Deactivate an entry
    Remove {
        /// Entry ID
        id: i64,
    },

    /// List active entries
    List {
        /// Only this day (1 = Monday .. 7 = Sunday)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=7))]
        day: Option<u8>,
    },

    /// Show today's entries
    Today,

    /// Print the weekly summary given to the assistant
    Summary,
}

#[derive(Args, Debug)]
pub struct EntryArgs {
    /// Action name (e.g. "Gym")
    pub name: String,

    /// Day of the week (1 = Monday .. 7 = Sunday)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=7))]
    pub day: u8,

    /// Start time (HH:mm)
    #[arg(short, long)]
    pub start: String,

    /// End time (HH:mm)
    #[arg(short, long)]
    pub end: String,

    /// Optional purpose
    #[arg(short, long, default_value = "")]
    pub objective: String,

    /// How to deliver the reminder
    #[arg(short, long, value_enum, default_value = "both")]
    pub mode: ModeArg,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    #[arg(short, long)]
    pub name: Option<String>,

    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=7))]
    pub day: Option<u8>,

    #[arg(short, long)]
    pub start: Option<String>,

    #[arg(short, long)]
    pub end: Option<String>,

    #[arg(short, long)]
    pub objective: Option<String>,

    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,
}

/// Reminder mode for CLI (maps to ReminderMode)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Notification,
    Voice,
    Both,
}

impl From<ModeArg> for ReminderMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Notification => ReminderMode::Notification,
            ModeArg::Voice => ReminderMode::Voice,
            ModeArg::Both => ReminderMode::Both,
        }
    }
}

/// Execute a schedule command
pub fn execute(command: ScheduleCommands, service: &ScheduleService) -> Result<()> {
    match command {
        ScheduleCommands::Add(args) => {
            let draft = NewScheduleEntry {
                id: None,
                day_of_week: args.day,
                action_name: args.name,
                objective: args.objective,
                start: args.start,
                end: args.end,
                reminder_mode: args.mode.into(),
            };
            let id = save(service, draft)?;
            println!("✅ Added entry {}", id);
            Ok(())
        }
        ScheduleCommands::Edit { id, changes } => {
            let Some(existing) = service.all()?.into_iter().find(|e| e.id == id) else {
                bail!("No active schedule entry with id {}", id);
            };
            let draft = NewScheduleEntry {
                id: Some(id),
                day_of_week: changes.day.unwrap_or(existing.day_of_week),
                action_name: changes.name.unwrap_or(existing.action_name),
                objective: changes.objective.unwrap_or(existing.objective),
                start: changes.start.unwrap_or_else(|| existing.start.to_string()),
                end: changes.end.unwrap_or_else(|| existing.end.to_string()),
                reminder_mode: changes.mode.map(Into::into).unwrap_or(existing.reminder_mode),
            };
            save(service, draft)?;
            println!("✅ Updated entry {}", id);
            Ok(())
        }
        ScheduleCommands::Remove { id } => {
            service.remove(id)?;
            println!("🗑️  Removed entry {}", id);
            Ok(())
        }
        ScheduleCommands::List { day } => {
            let entries = match day {
                Some(day) => service.entries_for_day(day)?,
                None => service.all()?,
            };
            print_entries(&entries);
            Ok(())
        }
        ScheduleCommands::Today => {
            let today = Local::now().weekday().number_from_monday() as u8;
            println!("{}:", day_name(today).unwrap_or("Today"));
            print_entries(&service.entries_for_day(today)?);
            Ok(())
        }
        ScheduleCommands::Summary => {
            println!("{}", service.summary()?);
            Ok(())
        }
    }
}

/// Save, turning a conflict into a readable listing
fn save(service: &ScheduleService, draft: NewScheduleEntry) -> Result<i64> {
    match service.save(draft) {
        Ok(id) => Ok(id),
        Err(ScheduleError::Validation(ValidationError::Conflict(conflicts))) => {
            println!("⚠️  Conflicts with:");
            for entry in &conflicts {
                println!("  [{}] {}", entry.id, entry.label());
            }
            let noun = if conflicts.len() == 1 { "entry" } else { "entries" };
            bail!("Schedule entry overlaps {} existing {}", conflicts.len(), noun)
        }
        Err(e) => Err(e.into()),
    }
}

fn print_entries(entries: &[ScheduleEntry]) {
    if entries.is_empty() {
        println!("  (no entries)");
        return;
    }

    println!(
        "  {:>4}  {:<9}  {:<11}  {:<12}  {:<20}  {}",
        "ID", "DAY", "TIME", "MODE", "ACTION", "OBJECTIVE"
    );
    for entry in entries {
        println!(
            "  {:>4}  {:<9}  {}-{}  {:<12}  {:<20}  {}",
            entry.id,
            day_name(entry.day_of_week).unwrap_or("?"),
            entry.start,
            entry.end,
            entry.reminder_mode.as_str(),
            entry.action_name,
            entry.objective
        );
    }
}
