//! Camera session lifetime.
//!
//! A [`CaptureSession`] exclusively owns one opened device. The
//! [`CameraSessionManager`] holds at most one of them at a time: acquiring a
//! new session stops the previous one first, and releasing is idempotent.
//! Dropping either type stops the device, so every exit path (including
//! teardown and cancelled futures) lets go of the hardware.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::device::{CaptureDevice, Constraints, DeviceProvider};
use crate::error::DeviceError;

pub(crate) type SharedDevice = Arc<Mutex<Box<dyn CaptureDevice>>>;

pub(crate) fn lock_device(device: &SharedDevice) -> MutexGuard<'_, Box<dyn CaptureDevice>> {
    device.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct CaptureSession {
    id: u64,
    device: Option<SharedDevice>,
}

impl CaptureSession {
    fn new(id: u64, device: Box<dyn CaptureDevice>) -> Self {
        Self {
            id,
            device: Some(Arc::new(Mutex::new(device))),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.device.is_some()
    }

    pub(crate) fn device(&self) -> Option<SharedDevice> {
        self.device.clone()
    }

    /// Stop the underlying stream. Returns `false` if it was already stopped.
    pub fn stop(&mut self) -> bool {
        match self.device.take() {
            Some(device) => {
                lock_device(&device).stop();
                log::debug!("capture session {} stopped", self.id);
                true
            }
            None => false,
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Acquire/release bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    pub acquired: u64,
    pub released: u64,
}

impl SessionCounters {
    pub fn open(&self) -> u64 {
        self.acquired - self.released
    }
}

pub struct CameraSessionManager {
    provider: Arc<dyn DeviceProvider>,
    active: Option<CaptureSession>,
    next_id: u64,
    counters: SessionCounters,
}

impl CameraSessionManager {
    pub fn new(provider: Arc<dyn DeviceProvider>) -> Self {
        Self {
            provider,
            active: None,
            next_id: 1,
            counters: SessionCounters::default(),
        }
    }

    /// Open a fresh session, stopping any session still held.
    ///
    /// The device is opened on the blocking pool; a stale handle is never
    /// reused. The session is built on the pool too, so if this future is
    /// dropped mid-open the orphaned device is stopped and never counted.
    pub async fn acquire(
        &mut self,
        constraints: &Constraints,
    ) -> Result<&mut CaptureSession, DeviceError> {
        self.release();

        let id = self.next_id;
        self.next_id += 1;
        let provider = Arc::clone(&self.provider);
        let constraints = *constraints;
        let session = tokio::task::spawn_blocking(move || {
            provider
                .open(&constraints)
                .map(|device| CaptureSession::new(id, device))
        })
        .await
        .map_err(|e| DeviceError::Join(e.to_string()))??;

        self.counters.acquired += 1;
        log::info!("capture session {} acquired", id);
        Ok(self.active.insert(session))
    }

    /// Stop the held session, if any. Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(mut session) = self.active.take() {
            session.stop();
            self.counters.released += 1;
            log::info!("capture session {} released", session.id());
        }
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.active.as_ref().filter(|s| s.is_active())
    }

    pub fn is_active(&self) -> bool {
        self.session().is_some()
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }
}

impl Drop for CameraSessionManager {
    fn drop(&mut self) {
        self.release();
    }
}
