//! Core of the ambient assistant.
//!
//! This module contains:
//! - Overlap: the validation gate for schedule changes
//! - Schedules: validator-gated schedule management
//! - Reminder: the periodic reminder engine
//! - Activation / Listener: wake detection and the audio pipeline
//! - Host: lifecycle of the background loops
//! - Clock / Shutdown / Phrases: injectable plumbing shared by the loops

pub mod activation;
pub mod clock;
pub mod host;
pub mod listener;
pub mod overlap;
pub mod phrases;
pub mod reminder;
pub mod schedules;
pub mod shutdown;

pub use activation::{
    frame_energy, ActivationMachine, ActivationState, Capture, Transition, WindowEnd,
};
pub use clock::{Clock, ManualClock, Moment, SystemClock, Ticker};
pub use host::{AmbientHost, HostHandle};
pub use listener::{
    Collaborators, CycleOutcome, Listener, ListenerSettings, ListenerStatus, SessionEnd,
    SHUTDOWN_GRACE,
};
pub use overlap::{overlaps, parse_time, OverlapValidator, Validation, ValidationError};
pub use phrases::{voice_message, FirstPhrase, PhraseSelector, RandomPhrases};
pub use reminder::{FireRecord, ReminderEngine, TickReport};
pub use schedules::{ScheduleError, ScheduleService};
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
