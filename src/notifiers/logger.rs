//! Notifier that writes every notification to the application log.

use super::{Notification, Notifier, PushSignal};
use crate::error::DeliveryError;
use log::info;

pub struct LogNotifier {
    name: String,
    signal: PushSignal,
}

impl LogNotifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signal: PushSignal::new(),
        }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new("Log Notifier")
    }
}

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        info!(
            "[{}] {} from {}: {}",
            self.name, notification.kind, notification.source, notification.text
        );
        Ok(())
    }

    fn signal(&self) -> &PushSignal {
        &self.signal
    }
}
