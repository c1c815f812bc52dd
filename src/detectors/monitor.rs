//! Hardware monitoring for pin-bound detectors.

use super::{DetectorKind, MotionDetector};
use crate::error::{EngineError, Result};
use crate::input::PinSource;
use log::{debug, info};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Guard for a running pin subscription.
///
/// The pin is released exactly once, when the guard is stopped or dropped.
pub struct Monitor {
    detector: String,
    pin: u8,
    source: Arc<dyn PinSource>,
    task: Option<JoinHandle<()>>,
}

impl Monitor {
    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.source.unsubscribe(self.pin);
            info!("{}: stopped monitoring pin {}", self.detector, self.pin);
        }
    }
}

impl MotionDetector {
    /// Subscribe to the detector's pin and feed every level transition into
    /// [`send`](MotionDetector::send).
    ///
    /// Must be called from within a tokio runtime. Fails before touching the
    /// pin source if the detector has no pin or there is no runtime.
    pub fn start_monitoring(&self, source: Arc<dyn PinSource>) -> Result<Monitor> {
        let DetectorKind::Pir { pin } = self.kind() else {
            return Err(EngineError::NotMonitorable(self.name().to_string()));
        };
        let handle = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        let mut levels = source.subscribe(pin)?;
        let detector = self.clone();
        let task = handle.spawn(async move {
            while let Some(level) = levels.recv().await {
                detector.send(level);
            }
            debug!("{}: pin {} stream closed", detector.name(), pin);
        });

        info!("{}: monitoring pin {}", self.name(), pin);
        Ok(Monitor {
            detector: self.name().to_string(),
            pin,
            source,
            task: Some(task),
        })
    }
}
