//! Time sources for the background loops.
//!
//! Both loops read time through [`Clock`] so tests can drive them with a
//! [`ManualClock`] instead of waiting on the wall clock.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::domain::TimeOfDay;

/// Source of local wall-clock time and monotonic instants
pub trait Clock: Send + Sync {
    /// Local wall-clock time, used for schedule matching
    fn local_now(&self) -> NaiveDateTime;

    /// Monotonic time, used for silence timeouts
    fn instant(&self) -> Instant;

    /// Capture "today" and "now" once
    fn moment(&self) -> Moment {
        Moment::from(self.local_now())
    }
}

/// The real clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

#[derive(Debug, Clone, Copy)]
struct ManualState {
    local: NaiveDateTime,
    instant: Instant,
}

impl ManualClock {
    pub fn new(local: NaiveDateTime) -> Self {
        Self {
            state: Mutex::new(ManualState {
                local,
                instant: Instant::now(),
            }),
        }
    }

    /// Move both the wall clock and the monotonic clock forward
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let step = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        state.local += step;
        state.instant += by;
    }

    /// Jump the wall clock without touching monotonic time
    pub fn set_local(&self, local: NaiveDateTime) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.local = local;
    }

    fn snapshot(&self) -> ManualState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Clock for ManualClock {
    fn local_now(&self) -> NaiveDateTime {
        self.snapshot().local
    }

    fn instant(&self) -> Instant {
        self.snapshot().instant
    }
}

/// One consistent reading of "today" and "now", minute precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Moment {
    pub date: NaiveDate,
    /// 1 = Monday .. 7 = Sunday
    pub day: u8,
    pub minute: TimeOfDay,
}

impl From<NaiveDateTime> for Moment {
    fn from(at: NaiveDateTime) -> Self {
        Self {
            date: at.date(),
            day: at.weekday().number_from_monday() as u8,
            minute: TimeOfDay::from(at.time()),
        }
    }
}

/// Fixed-period ticker. A late tick delays the following ones rather than
/// bursting to catch up.
pub struct Ticker {
    interval: Interval,
}

impl Ticker {
    /// The first tick completes immediately
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}
