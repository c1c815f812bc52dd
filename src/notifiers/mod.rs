//! Delivery channels for motion notifications.
//!
//! Every channel implements [`Notifier`]. The environment never calls
//! [`Notifier::deliver`] directly: it calls [`Notifier::push`], which attempts
//! the delivery and then raises the notifier's [`PushSignal`] with the
//! outcome, whether the delivery worked or not.
//!
//! Available channels:
//! - [`BaseNotifier`]: delivers nothing, only raises the signal
//! - [`LogNotifier`]: writes the notification to the log
//! - [`SpeechNotifier`]: speaks the text through a [`SpeechRenderer`]
//! - [`SlackNotifier`]: posts the text to a chat webhook

pub mod base;
pub mod logger;
pub mod slack;
pub mod speech;

pub use base::BaseNotifier;
pub use logger::LogNotifier;
pub use slack::{SlackExtension, SlackNotifier, UreqWebhook, WebhookClient};
pub use speech::{CommandSpeech, SpeechExtension, SpeechNotifier, SpeechRenderer};

use crate::detectors::Reading;
use crate::error::DeliveryError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// Text delivered to a notifier right before it is removed from an environment.
pub const REMOVAL_TEXT: &str = "Removing Notifier...";

/// Shared handle to a registered notifier.
pub type SharedNotifier = Arc<dyn Notifier>;

/// What caused a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
    /// The environment started monitoring.
    Startup,
    /// A detector reported a new reading.
    Motion,
    /// Farewell message to a notifier being removed.
    Removal,
}

/// Payload handed to every notifier in a dispatch round.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    /// Name of the environment or detector the change came from.
    pub source: String,
    pub text: String,
    pub kind: ChangeKind,
    pub reading: Option<Reading>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: ChangeKind, source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            text: text.into(),
            kind,
            reading: None,
            timestamp: Utc::now(),
        }
    }

    pub fn startup(environment: &str) -> Self {
        Self::new(
            ChangeKind::Startup,
            environment,
            format!("Environment '{}' started monitoring", environment),
        )
    }

    pub fn motion(detector: &str, reading: Reading) -> Self {
        let text = if reading.is_motion() {
            format!("Motion detected by {}", detector)
        } else {
            format!("Motion stopped at {}", detector)
        };
        let mut notification = Self::new(ChangeKind::Motion, detector, text);
        notification.reading = Some(reading);
        notification
    }

    pub fn removal(environment: &str) -> Self {
        Self::new(ChangeKind::Removal, environment, REMOVAL_TEXT)
    }
}

/// The "pushedNotification" signal payload: who pushed what, and how it went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedNotification {
    pub notifier: String,
    pub text: String,
    pub outcome: Result<(), DeliveryError>,
}

impl PushedNotification {
    pub fn is_delivered(&self) -> bool {
        self.outcome.is_ok()
    }
}

type PushListener = Box<dyn Fn(&PushedNotification) + Send + Sync>;

/// Synchronous listener list raised after every delivery attempt.
///
/// Listeners run on the dispatching thread and must not connect new
/// listeners to the same signal from inside their callback.
#[derive(Default)]
pub struct PushSignal {
    listeners: RwLock<Vec<PushListener>>,
}

impl PushSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for every future push.
    pub fn connect<F>(&self, listener: F)
    where
        F: Fn(&PushedNotification) + Send + Sync + 'static,
    {
        self.listeners.write().push(Box::new(listener));
    }

    pub fn emit(&self, pushed: &PushedNotification) {
        for listener in self.listeners.read().iter() {
            listener(pushed);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

/// A delivery channel.
pub trait Notifier: Send + Sync {
    /// Human readable name, carried in every pushed notification.
    fn name(&self) -> &str;

    /// Attempt to deliver the notification through this channel.
    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;

    /// Signal raised after each delivery attempt.
    fn signal(&self) -> &PushSignal;

    /// Deliver, then raise the signal with the outcome.
    fn push(&self, notification: &Notification) -> PushedNotification {
        let outcome = self.deliver(notification);
        let pushed = PushedNotification {
            notifier: self.name().to_string(),
            text: notification.text.clone(),
            outcome,
        };
        self.signal().emit(&pushed);
        pushed
    }

    /// Convenience for `signal().connect(..)`.
    fn on_pushed<F>(&self, listener: F)
    where
        F: Fn(&PushedNotification) + Send + Sync + 'static,
        Self: Sized,
    {
        self.signal().connect(listener);
    }
}

/// Identity comparison between a registered notifier and any notifier reference.
pub(crate) fn same_notifier(registered: &SharedNotifier, other: &dyn Notifier) -> bool {
    std::ptr::eq(
        Arc::as_ptr(registered) as *const (),
        other as *const dyn Notifier as *const (),
    )
}
