//! Monitoring session: registered detectors, registered notifiers and the
//! fan-out loop between them.
//!
//! Every change (a detector change or the start-up change) becomes one
//! dispatch round: the notification is pushed to each notifier registered at
//! that moment, in registration order, one after the other. A failing
//! notifier is logged and recorded; the round always continues.

use crate::detectors::{MotionDetector, Reading};
use crate::notifiers::{Notification, Notifier, PushedNotification, SharedNotifier, same_notifier};
use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

pub const DEFAULT_ENVIRONMENT_NAME: &str = "No name";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentOptions {
    pub name: Option<String>,
}

/// Outcome of one dispatch round.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub notification: Notification,
    /// One entry per notifier, in delivery order.
    pub pushed: Vec<PushedNotification>,
}

impl DispatchReport {
    pub fn delivered_count(&self) -> usize {
        self.pushed.iter().filter(|p| p.is_delivered()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PushedNotification> {
        self.pushed.iter().filter(|p| !p.is_delivered())
    }

    /// Notifier names in the order they were pushed to.
    pub fn recipients(&self) -> Vec<&str> {
        self.pushed.iter().map(|p| p.notifier.as_str()).collect()
    }
}

struct EnvironmentInner {
    name: String,
    detectors: RwLock<Vec<MotionDetector>>,
    notifiers: RwLock<Vec<SharedNotifier>>,
    rounds: AtomicU64,
}

/// Shared handle to a monitoring session.
#[derive(Clone)]
pub struct Environment {
    inner: Arc<EnvironmentInner>,
}

/// Non-owning handle a detector keeps to the environment it reports to.
#[derive(Clone)]
pub(crate) struct WeakEnvironment(Weak<EnvironmentInner>);

impl WeakEnvironment {
    pub(crate) fn upgrade(&self) -> Option<Environment> {
        self.0.upgrade().map(|inner| Environment { inner })
    }
}

impl Environment {
    pub fn new(options: EnvironmentOptions) -> Self {
        Self {
            inner: Arc::new(EnvironmentInner {
                name: options
                    .name
                    .unwrap_or_else(|| DEFAULT_ENVIRONMENT_NAME.to_string()),
                detectors: RwLock::new(Vec::new()),
                notifiers: RwLock::new(Vec::new()),
                rounds: AtomicU64::new(0),
            }),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(EnvironmentOptions {
            name: Some(name.into()),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Register a detector and route its changes here.
    ///
    /// A detector belongs to one environment at a time; registering it in a
    /// second one removes it from the first.
    pub fn add_detector(&self, detector: &MotionDetector) {
        {
            let mut detectors = self.inner.detectors.write();
            if !detectors.iter().any(|d| d.same_as(detector)) {
                detectors.push(detector.clone());
            }
        }

        let weak = Arc::downgrade(&self.inner);
        let listener = weak.clone();
        let previous = detector.attach(
            WeakEnvironment(weak),
            Arc::new(move |detector: &MotionDetector, reading: Reading| {
                if let Some(inner) = listener.upgrade() {
                    Environment { inner }.on_change(detector, reading);
                }
            }),
        );
        info!("[{}] added detector {}", self.name(), detector.name());

        if let Some(previous) = previous.and_then(|weak| weak.upgrade())
            && !previous.same_as(self)
        {
            previous.release_detector(detector);
        }
    }

    fn release_detector(&self, detector: &MotionDetector) {
        self.inner.detectors.write().retain(|d| !d.same_as(detector));
        info!("[{}] released detector {}", self.name(), detector.name());
    }

    /// Whether both handles point at the same environment.
    pub fn same_as(&self, other: &Environment) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register a notifier. It only hears about changes from now on.
    pub fn add_notifier(&self, notifier: SharedNotifier) {
        info!("[{}] added notifier {}", self.name(), notifier.name());
        self.inner.notifiers.write().push(notifier);
    }

    /// Remove a notifier and push it a farewell notification.
    ///
    /// Returns `None` if the notifier was not registered here.
    pub fn remove_notifier(&self, notifier: &dyn Notifier) -> Option<PushedNotification> {
        let removed = {
            let mut notifiers = self.inner.notifiers.write();
            let index = notifiers.iter().position(|n| same_notifier(n, notifier))?;
            notifiers.remove(index)
        };

        info!("[{}] removing notifier {}", self.name(), removed.name());
        Some(removed.push(&Notification::removal(self.name())))
    }

    pub fn detectors(&self) -> Vec<MotionDetector> {
        self.inner.detectors.read().clone()
    }

    pub fn notifiers(&self) -> Vec<SharedNotifier> {
        self.inner.notifiers.read().clone()
    }

    pub fn detector_count(&self) -> usize {
        self.inner.detectors.read().len()
    }

    pub fn notifier_count(&self) -> usize {
        self.inner.notifiers.read().len()
    }

    /// Number of dispatch rounds run so far.
    pub fn dispatch_rounds(&self) -> u64 {
        self.inner.rounds.load(Ordering::SeqCst)
    }

    /// Dispatch the start-up change: monitoring has begun.
    pub fn announce_start(&self) -> DispatchReport {
        info!("[{}] monitoring started", self.name());
        self.dispatch(Notification::startup(self.name()))
    }

    /// Push `notification` to every notifier registered right now.
    ///
    /// Runs on a snapshot of the notifier list, so notifiers added or
    /// removed during the round only affect later rounds.
    pub fn dispatch(&self, notification: Notification) -> DispatchReport {
        let notifiers = self.notifiers();
        self.inner.rounds.fetch_add(1, Ordering::SeqCst);

        let mut pushed = Vec::with_capacity(notifiers.len());
        for notifier in &notifiers {
            let result = notifier.push(&notification);
            match &result.outcome {
                Ok(()) => debug!("[{}] delivered to {}", self.name(), result.notifier),
                Err(e) => warn!(
                    "[{}] delivery to {} failed: {}",
                    self.name(),
                    result.notifier,
                    e
                ),
            }
            pushed.push(result);
        }

        DispatchReport {
            notification,
            pushed,
        }
    }

    fn on_change(&self, detector: &MotionDetector, reading: Reading) {
        self.dispatch(Notification::motion(detector.name(), reading));
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(EnvironmentOptions::default())
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("name", &self.inner.name)
            .field("detectors", &self.detector_count())
            .field("notifiers", &self.notifier_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::DetectorKind;
    use crate::error::DeliveryError;
    use crate::notifiers::{BaseNotifier, PushSignal};
    use parking_lot::Mutex;

    struct Failing {
        signal: PushSignal,
    }

    impl Notifier for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn deliver(&self, _notification: &Notification) -> Result<(), DeliveryError> {
            Err(DeliveryError::Webhook("unreachable".into()))
        }

        fn signal(&self) -> &PushSignal {
            &self.signal
        }
    }

    fn recorded(notifier: &BaseNotifier) -> Arc<Mutex<Vec<String>>> {
        let texts = Arc::new(Mutex::new(Vec::new()));
        let sink = texts.clone();
        notifier.on_pushed(move |pushed| sink.lock().push(pushed.text.clone()));
        texts
    }

    #[test]
    fn test_default_name() {
        assert_eq!(Environment::default().name(), "No name");
        assert_eq!(Environment::named("Attic").name(), "Attic");
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let env = Environment::named("Lab");
        for name in ["first", "second", "third"] {
            env.add_notifier(Arc::new(BaseNotifier::new(name)));
        }

        let report = env.announce_start();
        assert_eq!(report.recipients(), vec!["first", "second", "third"]);
        assert_eq!(report.delivered_count(), 3);
        assert_eq!(env.dispatch_rounds(), 1);
    }

    #[test]
    fn test_failure_does_not_stop_the_round() {
        let env = Environment::named("Lab");
        let last = Arc::new(BaseNotifier::new("last"));
        let texts = recorded(&last);
        env.add_notifier(Arc::new(Failing {
            signal: PushSignal::new(),
        }));
        env.add_notifier(last.clone());

        let report = env.announce_start();

        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.delivered_count(), 1);
        assert_eq!(texts.lock().len(), 1);
    }

    #[test]
    fn test_detector_changes_are_dispatched() {
        let env = Environment::named("Lab");
        let notifier = Arc::new(BaseNotifier::new("probe"));
        let texts = recorded(&notifier);
        env.add_notifier(notifier.clone());

        let detector = MotionDetector::new(1, DetectorKind::Synthetic, Some("Door".into()));
        env.add_detector(&detector);
        env.add_detector(&detector);
        assert_eq!(env.detector_count(), 1);

        detector.send(1);
        detector.send(1);
        detector.send(0);

        assert_eq!(
            *texts.lock(),
            vec!["Motion detected by Door", "Motion stopped at Door"]
        );
    }

    #[test]
    fn test_remove_notifier_pushes_farewell_once() {
        let env = Environment::named("Lab");
        let notifier = Arc::new(BaseNotifier::new("leaving"));
        let texts = recorded(&notifier);
        env.add_notifier(notifier.clone());

        let farewell = env.remove_notifier(notifier.as_ref()).unwrap();
        assert_eq!(farewell.text, "Removing Notifier...");
        assert_eq!(env.notifier_count(), 0);

        env.announce_start();
        assert_eq!(*texts.lock(), vec!["Removing Notifier..."]);

        assert!(env.remove_notifier(notifier.as_ref()).is_none());
    }

    #[test]
    fn test_registering_elsewhere_moves_the_detector() {
        let first = Environment::named("Front");
        let second = Environment::named("Back");
        let detector = MotionDetector::new(1, DetectorKind::Synthetic, None);

        first.add_detector(&detector);
        second.add_detector(&detector);
        detector.send(1);

        assert_eq!(first.detector_count(), 0);
        assert_eq!(first.dispatch_rounds(), 0);
        assert_eq!(second.detector_count(), 1);
        assert_eq!(second.dispatch_rounds(), 1);

        // Re-registering where it already is keeps it there
        second.add_detector(&detector);
        assert_eq!(second.detector_count(), 1);
    }

    #[test]
    fn test_dropped_environment_stops_listening() {
        let detector = MotionDetector::new(1, DetectorKind::Synthetic, None);
        {
            let env = Environment::named("Temporary");
            env.add_detector(&detector);
        }
        // Detector holds only a weak reference; sending must not panic
        assert!(detector.send(1));
    }
}
