//! Reminder engine.
//!
//! A fixed-period loop that reads today's active entries and delivers a
//! reminder for every entry whose start minute equals the current minute.
//! Matching is exact: a tick that lands after the start minute (process
//! suspended, machine asleep) skips that reminder.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{DeliveryError, Notification, NotificationSink, SpeechSink};
use crate::config::ReminderSettings;
use crate::domain::{ScheduleEntry, TimeOfDay};
use crate::store::ScheduleStore;

use super::clock::{Clock, Moment, Ticker};
use super::phrases::{voice_message, PhraseSelector};
use super::shutdown::Shutdown;

/// Entries already fired in the current minute.
///
/// Keyed by minute bucket: moving to a new minute forgets everything, so
/// the set never grows past one minute's worth of entries.
#[derive(Debug, Default)]
pub struct FireRecord {
    bucket: Option<(NaiveDate, TimeOfDay)>,
    fired: HashSet<i64>,
}

impl FireRecord {
    /// Switch to the bucket for `moment`, clearing it if the minute changed
    pub fn enter(&mut self, moment: &Moment) {
        let bucket = (moment.date, moment.minute);
        if self.bucket != Some(bucket) {
            self.bucket = Some(bucket);
            self.fired.clear();
        }
    }

    /// Record `id` as fired. Returns false if it already was.
    pub fn mark(&mut self, id: i64) -> bool {
        self.fired.insert(id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.fired.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }
}

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Entries whose start matched the current minute
    pub due: usize,
    /// Due entries skipped because they already fired this minute
    pub already_fired: usize,
    /// Successful sink deliveries
    pub delivered: usize,
    /// Failed or timed-out sink deliveries
    pub failed: usize,
    /// The store could not be read; nothing was evaluated
    pub store_unavailable: bool,
}

/// Polls the schedule and dispatches reminders
pub struct ReminderEngine {
    store: Arc<dyn ScheduleStore>,
    notifier: Arc<dyn NotificationSink>,
    speaker: Arc<dyn SpeechSink>,
    clock: Arc<dyn Clock>,
    phrases: Arc<dyn PhraseSelector>,
    settings: ReminderSettings,
    user_name: String,
    fired: FireRecord,
}

impl ReminderEngine {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        notifier: Arc<dyn NotificationSink>,
        speaker: Arc<dyn SpeechSink>,
        clock: Arc<dyn Clock>,
        phrases: Arc<dyn PhraseSelector>,
        settings: ReminderSettings,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            speaker,
            clock,
            phrases,
            settings,
            user_name: user_name.into(),
            fired: FireRecord::default(),
        }
    }

    /// Tick until shutdown. Never returns early on error.
    #[instrument(skip_all, name = "reminders")]
    pub async fn run(mut self, mut shutdown: Shutdown) {
        let mut ticker = Ticker::new(self.settings.tick_interval());
        info!(interval = ?ticker.period(), "Reminder engine started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                _ = ticker.tick() => {
                    let report = self.tick().await;
                    if report.due > 0 {
                        debug!(?report, "Reminder tick");
                    }
                }
            }
        }

        info!("Reminder engine stopped");
    }

    /// Run one evaluation against a single snapshot of "now"
    pub async fn tick(&mut self) -> TickReport {
        let moment = self.clock.moment();
        self.fired.enter(&moment);

        let mut report = TickReport::default();
        let entries = match self.store.active_entries_for_day(moment.day) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(day = moment.day, error = %e, "Failed to read today's schedule");
                report.store_unavailable = true;
                return report;
            }
        };

        for entry in entries.iter().filter(|e| e.start == moment.minute) {
            report.due += 1;
            if !self.fired.mark(entry.id) {
                report.already_fired += 1;
                continue;
            }
            let (ok, failed) = self.dispatch(entry).await;
            report.delivered += ok;
            report.failed += failed;
        }

        report
    }

    /// Deliver one entry per its mode; returns (delivered, failed)
    async fn dispatch(&self, entry: &ScheduleEntry) -> (usize, usize) {
        if entry.action_name.trim().is_empty() {
            warn!(schedule_id = entry.id, "Schedule entry has no name");
            let notice = Notification {
                id: format!("reminder-{}", entry.id),
                title: "⏰ Reminder".to_string(),
                body: format!("A reminder at {} could not be formed", entry.start),
            };
            let ok = self
                .deliver(entry.id, "notification", self.notifier.notify(&notice))
                .await;
            return (usize::from(ok), 1);
        }

        info!(
            schedule_id = entry.id,
            action = %entry.action_name,
            mode = entry.reminder_mode.as_str(),
            "Firing reminder"
        );

        let notify = async {
            if !entry.reminder_mode.notifies() {
                return None;
            }
            let notification = Notification {
                id: format!("reminder-{}", entry.id),
                title: format!("⏰ Reminder - {}", entry.action_name),
                body: format!("{} - {}", entry.start, entry.objective),
            };
            Some(
                self.deliver(entry.id, "notification", self.notifier.notify(&notification))
                    .await,
            )
        };

        let speak = async {
            if !entry.reminder_mode.speaks() {
                return None;
            }
            let message = voice_message(entry, &self.user_name, self.phrases.as_ref());
            Some(self.deliver(entry.id, "speech", self.speaker.speak(&message)).await)
        };

        let (notified, spoke) = tokio::join!(notify, speak);
        [notified, spoke]
            .into_iter()
            .flatten()
            .fold((0, 0), |(ok, failed), delivered| {
                if delivered {
                    (ok + 1, failed)
                } else {
                    (ok, failed + 1)
                }
            })
    }

    async fn deliver<F>(&self, schedule_id: i64, sink: &'static str, delivery: F) -> bool
    where
        F: Future<Output = Result<(), DeliveryError>>,
    {
        match tokio::time::timeout(self.settings.delivery_timeout(), delivery).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(schedule_id, sink, error = %e, "Reminder delivery failed");
                false
            }
            Err(_) => {
                warn!(schedule_id, sink, "Reminder delivery timed out");
                false
            }
        }
    }
}
