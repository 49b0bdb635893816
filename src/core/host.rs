//! Ambient service host.
//!
//! Owns the lifecycle of the two background loops: both are spawned on
//! start with a shared shutdown signal, and [`HostHandle::stop`] signals
//! and waits for them. The loops share no state with each other.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::listener::{Listener, ListenerStatus};
use super::reminder::ReminderEngine;
use super::shutdown::{shutdown_channel, ShutdownTrigger};

/// Configured but not yet running host
#[derive(Default)]
pub struct AmbientHost {
    reminders: Option<ReminderEngine>,
    listener: Option<Listener>,
}

impl AmbientHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reminders(mut self, engine: ReminderEngine) -> Self {
        self.reminders = Some(engine);
        self
    }

    pub fn with_listener(mut self, listener: Listener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Spawn every configured loop
    pub fn start(self) -> HostHandle {
        let (trigger, shutdown) = shutdown_channel();
        let mut tasks = Vec::new();

        if let Some(engine) = self.reminders {
            tasks.push(("reminders", tokio::spawn(engine.run(shutdown.clone()))));
        }

        let listener_status = self.listener.map(|listener| {
            let status = listener.status();
            tasks.push(("listener", tokio::spawn(listener.run_forever(shutdown.clone()))));
            status
        });

        info!(loops = tasks.len(), "Ambient host started");
        HostHandle {
            trigger,
            tasks,
            listener_status,
        }
    }
}

/// A running host
pub struct HostHandle {
    trigger: ShutdownTrigger,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    listener_status: Option<watch::Receiver<ListenerStatus>>,
}

impl HostHandle {
    /// Names of loops still running
    pub fn running(&self) -> Vec<&'static str> {
        self.tasks
            .iter()
            .filter(|(_, task)| !task.is_finished())
            .map(|(name, _)| *name)
            .collect()
    }

    /// Status feed of the listener, if one was started
    pub fn listener_status(&self) -> Option<watch::Receiver<ListenerStatus>> {
        self.listener_status.clone()
    }

    /// Signal shutdown and wait for every loop to release its resources
    pub async fn stop(self) {
        info!("Stopping ambient host");
        self.trigger.trigger();

        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                error!(task = name, error = %e, "Background loop ended abnormally");
            }
        }

        info!("Ambient host stopped");
    }
}
