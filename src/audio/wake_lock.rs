//! Wake-lock equivalents.
//!
//! On Linux desktops the closest thing to a mobile wake lock is a
//! `systemd-inhibit` process held open for as long as sleep must be blocked.

use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

use super::DeviceError;

/// A resource that keeps the device awake while held
pub trait WakeLock: Send + Sync {
    fn acquire(&self) -> Result<(), DeviceError>;

    /// Release the lock. Must be safe to call when not held.
    fn release(&self);
}

/// Releases a [`WakeLock`] when dropped
pub struct WakeLockGuard<'a> {
    lock: &'a dyn WakeLock,
}

impl<'a> WakeLockGuard<'a> {
    pub fn acquire(lock: &'a dyn WakeLock) -> Result<Self, DeviceError> {
        lock.acquire()?;
        Ok(Self { lock })
    }
}

impl Drop for WakeLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// No-op lock for machines that never sleep (or tests)
#[derive(Debug, Default)]
pub struct NoopWakeLock;

impl WakeLock for NoopWakeLock {
    fn acquire(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn release(&self) {}
}

/// Holds `systemd-inhibit --what=sleep:idle` while acquired
pub struct InhibitWakeLock {
    why: String,
    child: Mutex<Option<Child>>,
}

impl InhibitWakeLock {
    pub fn new(why: impl Into<String>) -> Self {
        Self {
            why: why.into(),
            child: Mutex::new(None),
        }
    }
}

impl WakeLock for InhibitWakeLock {
    fn acquire(&self) -> Result<(), DeviceError> {
        let mut held = self
            .child
            .lock()
            .map_err(|_| DeviceError::WakeLock("lock poisoned".to_string()))?;
        if held.is_some() {
            return Ok(());
        }

        let child = Command::new("systemd-inhibit")
            .args([
                "--what=sleep:idle",
                "--who=almex",
                &format!("--why={}", self.why),
                "--mode=block",
                "sleep",
                "infinity",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DeviceError::WakeLock(e.to_string()))?;

        *held = Some(child);
        tracing::debug!("Sleep inhibitor acquired");
        Ok(())
    }

    fn release(&self) {
        let Ok(mut held) = self.child.lock() else {
            return;
        };
        if let Some(mut child) = held.take() {
            let _ = child.kill();
            // Release runs from guard drops on async tasks; never block there
            // waiting for the inhibitor to exit.
            if let Ok(None) = child.try_wait() {
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            tracing::debug!("Sleep inhibitor released");
        }
    }
}

impl Drop for InhibitWakeLock {
    fn drop(&mut self) {
        self.release();
    }
}
