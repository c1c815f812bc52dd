//! Notifier that delivers nothing.

use super::{Notification, Notifier, PushSignal};
use crate::error::DeliveryError;

/// Notifier whose delivery is a no-op.
///
/// It still raises its push signal on every delivery, which makes it the
/// probe of choice for checking the bus itself.
pub struct BaseNotifier {
    name: String,
    signal: PushSignal,
}

impl BaseNotifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signal: PushSignal::new(),
        }
    }
}

impl Default for BaseNotifier {
    fn default() -> Self {
        Self::new("Base Notifier")
    }
}

impl Notifier for BaseNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&self, _notification: &Notification) -> Result<(), DeliveryError> {
        Ok(())
    }

    fn signal(&self) -> &PushSignal {
        &self.signal
    }
}
