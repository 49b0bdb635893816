//! Microphone capture and related device resources.
//!
//! - [`AudioSource`] / [`AudioCapture`]: open the microphone and read
//!   fixed-size frames of 16-bit mono PCM
//! - [`WakeLock`]: keeps the machine awake while the listener runs
//! - [`encode_wav`]: packs a captured window for upload

pub mod recorder;
pub mod wake_lock;
pub mod wav;

use async_trait::async_trait;
use thiserror::Error;

pub use recorder::RecorderSource;
pub use wake_lock::{InhibitWakeLock, NoopWakeLock, WakeLock, WakeLockGuard};
pub use wav::encode_wav;

/// Microphone or device resource failure
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Audio device unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV encoding failed: {0}")]
    Encode(#[from] hound::Error),

    #[error("Wake lock unavailable: {0}")]
    WakeLock(String),
}

/// Something that can hand out an exclusive microphone capture
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Acquire the microphone
    async fn open(&self) -> Result<Box<dyn AudioCapture>, DeviceError>;
}

/// An open microphone handle
#[async_trait]
pub trait AudioCapture: Send {
    /// Read the next frame. `Ok(None)` means the stream ended.
    async fn read_frame(&mut self) -> Result<Option<Vec<i16>>, DeviceError>;

    /// Release the device. Called exactly once, on every exit path.
    async fn close(&mut self);
}
