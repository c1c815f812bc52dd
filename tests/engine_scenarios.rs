use motion_bus::notifiers::{
    BaseNotifier, PushSignal, SlackExtension, SlackNotifier, SpeechExtension, SpeechNotifier,
    SpeechRenderer, WebhookClient,
};
use motion_bus::{
    DeliveryError, EngineError, Environment, EnvironmentOptions, Extension, Notification,
    Notifier, PushedNotification, StartConfig,
};
use motion_bus::{CapabilityConfig, Engine};
use parking_lot::Mutex;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<PushedNotification>>>;

fn record(notifier: &impl Notifier) -> Log {
    let log: Log = Arc::default();
    let sink = log.clone();
    notifier.on_pushed(move |pushed| sink.lock().push(pushed.clone()));
    log
}

fn texts(log: &Log) -> Vec<String> {
    log.lock().iter().map(|p| p.text.clone()).collect()
}

struct Broken {
    signal: PushSignal,
}

impl Notifier for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn deliver(&self, _notification: &Notification) -> Result<(), DeliveryError> {
        Err(DeliveryError::Webhook("host unreachable".into()))
    }

    fn signal(&self) -> &PushSignal {
        &self.signal
    }
}

#[derive(Default)]
struct Outbox(Mutex<Vec<String>>);

impl WebhookClient for Outbox {
    fn post_message(&self, _url: &str, text: &str) -> Result<(), DeliveryError> {
        self.0.lock().push(text.to_string());
        Ok(())
    }
}

struct Silent;

impl SpeechRenderer for Silent {
    fn speak(&self, _text: &str) -> Result<(), DeliveryError> {
        Ok(())
    }
}

#[test]
fn registering_without_environment_fails_for_every_variant() {
    let mut engine = Engine::new();
    let synthetic = engine.motion_detector();

    let err = engine.add_detector(&synthetic).unwrap_err();
    assert!(matches!(err, EngineError::NoEnvironment));
    assert_eq!(
        err.to_string(),
        "No environment was detected, please add one first."
    );

    assert!(matches!(
        engine.pir_detector(17),
        Err(EngineError::NoEnvironment)
    ));
    assert!(matches!(
        engine.create_detector(&CapabilityConfig::new("pir").with_pin(17)),
        Err(EngineError::NoEnvironment)
    ));
    assert!(matches!(
        engine.add_notifier(Arc::new(BaseNotifier::default())),
        Err(EngineError::NoEnvironment)
    ));
}

#[test]
fn count_tracks_constructions_not_registrations() {
    let mut engine = Engine::new();
    assert_eq!(engine.count(), 0);

    let detector = engine.motion_detector();
    assert_eq!(engine.count(), 1);
    assert!(engine.add_detector(&detector).is_err());
    assert_eq!(engine.count(), 1);

    assert!(engine.pir_detector(17).is_err());
    assert_eq!(engine.count(), 1);

    engine.start(StartConfig::default());
    let pir = engine.pir_detector(17).unwrap();
    engine.add_detector(&pir).unwrap();
    assert_eq!(engine.count(), 2);
}

#[test]
fn start_dispatches_exactly_once_without_detectors() {
    let mut engine = Engine::new();
    let notifier = Arc::new(BaseNotifier::new("probe"));
    let log = record(notifier.as_ref());

    let report = engine.start(StartConfig::default().with_notifier(notifier.clone()));

    assert_eq!(report.pushed.len(), 1);
    assert_eq!(texts(&log), vec!["Environment 'No name' started monitoring"]);
    assert_eq!(engine.environment().unwrap().dispatch_rounds(), 1);
}

#[test]
fn identical_readings_fire_once() {
    let mut engine = Engine::new();
    let detector = engine.motion_detector();
    let notifier = Arc::new(BaseNotifier::new("probe"));
    engine.start(
        StartConfig::default()
            .with_detector(detector.clone())
            .with_notifier(notifier.clone()),
    );
    let log = record(notifier.as_ref());

    detector.send(1);
    detector.send(1);
    detector.send(0);
    detector.send(1);
    detector.send(1);

    assert_eq!(
        texts(&log),
        vec![
            "Motion detected by Motion Detector #1",
            "Motion stopped at Motion Detector #1",
            "Motion detected by Motion Detector #1",
        ]
    );
}

#[test]
fn removed_notifier_gets_farewell_and_nothing_else() {
    let mut engine = Engine::new();
    let detector = engine.motion_detector();
    engine.start(StartConfig::default().with_detector(detector.clone()));

    let notifier = Arc::new(BaseNotifier::new("leaving"));
    engine.add_notifier(notifier.clone()).unwrap();
    let log = record(notifier.as_ref());

    let farewell = engine.remove_notifier(notifier.as_ref()).unwrap().unwrap();
    assert_eq!(farewell.text, "Removing Notifier...");

    detector.send(1);
    assert_eq!(texts(&log), vec!["Removing Notifier..."]);
}

#[test]
fn late_notifiers_are_not_notified_retroactively() {
    let mut engine = Engine::new();
    let detector = engine.motion_detector();
    let early = Arc::new(BaseNotifier::new("early"));
    let early_log = record(early.as_ref());
    engine.start(
        StartConfig::default()
            .with_detector(detector.clone())
            .with_notifier(early.clone()),
    );
    detector.send(1);

    let late = Arc::new(BaseNotifier::new("late"));
    let late_log = record(late.as_ref());
    engine.add_notifier(late.clone()).unwrap();
    assert!(late_log.lock().is_empty());

    let order = Arc::new(Mutex::new(Vec::new()));
    for notifier in [&early, &late] {
        let order = order.clone();
        notifier.on_pushed(move |pushed| order.lock().push(pushed.notifier.clone()));
    }
    detector.send(0);

    assert_eq!(early_log.lock().len(), 3);
    assert_eq!(texts(&late_log), vec!["Motion stopped at Motion Detector #1"]);
    assert_eq!(*order.lock(), vec!["early", "late"]);
}

#[test]
fn failing_notifier_does_not_block_later_ones() {
    let mut engine = Engine::new();
    let after = Arc::new(BaseNotifier::new("after"));
    let log = record(after.as_ref());

    let env = Environment::named("Hall");
    env.add_notifier(Arc::new(Broken {
        signal: PushSignal::new(),
    }));
    env.add_notifier(after.clone());

    let report = engine.start(StartConfig::default().with_environment(env));

    assert_eq!(report.recipients(), vec!["broken", "after"]);
    assert_eq!(report.failures().count(), 1);
    assert_eq!(log.lock().len(), 1);
    assert!(log.lock()[0].is_delivered());
}

#[test]
fn default_start_uses_no_name_environment() {
    let mut engine = Engine::new();
    assert!(engine.environment().is_none());

    engine.start(StartConfig::default());
    assert_eq!(engine.environment().unwrap().name(), "No name");
}

#[test]
fn custom_environment_replaces_default() {
    let mut engine = Engine::new();
    engine.start(StartConfig::default().with_environment(Environment::new(EnvironmentOptions {
        name: Some("My Environment".to_string()),
    })));
    assert_eq!(engine.environment().unwrap().name(), "My Environment");
}

#[test]
fn slack_notifier_hears_motion_after_start() {
    let mut engine = Engine::new();
    let detector = engine.motion_detector();
    let outbox = Arc::new(Outbox::default());
    let slack = Arc::new(SlackNotifier::with_client(
        "My Slack",
        "https://hooks.example/services/T/B/x",
        outbox.clone(),
    ));
    let log = record(slack.as_ref());

    engine.start(
        StartConfig::default()
            .with_environment(Environment::default())
            .with_detector(detector.clone())
            .with_notifier(slack.clone()),
    );
    detector.send(1);

    assert!(log.lock().iter().all(|p| p.notifier == "My Slack"));
    assert_eq!(
        *outbox.0.lock(),
        vec![
            "Environment 'No name' started monitoring",
            "Motion detected by Motion Detector #1",
        ]
    );
}

#[test]
fn extensions_load_once_through_either_entry_point() {
    let mut engine = Engine::new();
    assert!(engine.use_extension(&SpeechExtension));
    assert!(!SpeechExtension.use_in(&mut engine));
    assert!(SlackExtension.use_in(&mut engine));
    assert!(!engine.use_extension(&SlackExtension));

    let kinds: Vec<_> = engine.registry().notifier_kinds().collect();
    assert_eq!(kinds, vec!["base", "log", "slack", "speech"]);

    let voice = Arc::new(SpeechNotifier::with_renderer("voice", Arc::new(Silent)));
    let log = record(voice.as_ref());
    engine.start(StartConfig::default().with_notifier(voice.clone()));
    assert_eq!(texts(&log), vec!["Environment 'No name' started monitoring"]);
}

#[tokio::test]
async fn pir_detector_reports_pin_transitions() {
    use motion_bus::input::SimulatedPins;
    use std::time::Duration;

    let mut engine = Engine::new();
    let notifier = Arc::new(BaseNotifier::new("probe"));
    engine.start(StartConfig::default().with_notifier(notifier.clone()));
    let log = record(notifier.as_ref());

    let pir = engine.pir_detector(17).unwrap();
    engine.add_detector(&pir).unwrap();

    let pins = Arc::new(SimulatedPins::new());
    let monitor = pir.start_monitoring(pins.clone()).unwrap();
    pins.set_level(17, true);
    pins.set_level(17, true);
    pins.set_level(17, false);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        texts(&log),
        vec![
            "Motion detected by PIR Motion Detector (pin 17)",
            "Motion stopped at PIR Motion Detector (pin 17)",
        ]
    );

    drop(monitor);
    assert!(!pins.is_subscribed(17));
}
