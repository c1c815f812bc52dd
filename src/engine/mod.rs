//! The engine: explicit context binding one active environment.
//!
//! Nothing can be registered before [`Engine::start`] has installed an
//! environment. The engine also counts detector constructions and holds the
//! capability registry that extensions load into.

pub mod registry;

pub use registry::{CapabilityConfig, CapabilityRegistry, CoreExtension, Extension};

use crate::detectors::{DetectorKind, MotionDetector};
use crate::environment::{DispatchReport, Environment};
use crate::error::{EngineError, Result};
use crate::notifiers::{Notifier, PushedNotification, SharedNotifier};
use log::info;

/// Options for [`Engine::start`].
#[derive(Default)]
pub struct StartConfig {
    /// Environment to activate instead of a fresh "No name" one.
    pub environment: Option<Environment>,
    pub initial_motion_detector: Option<MotionDetector>,
    pub initial_notifier: Option<SharedNotifier>,
}

impl StartConfig {
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_detector(mut self, detector: MotionDetector) -> Self {
        self.initial_motion_detector = Some(detector);
        self
    }

    pub fn with_notifier(mut self, notifier: SharedNotifier) -> Self {
        self.initial_notifier = Some(notifier);
        self
    }
}

pub struct Engine {
    environment: Option<Environment>,
    detector_count: u64,
    registry: CapabilityRegistry,
}

impl Engine {
    /// Create an engine with no active environment and the core capabilities loaded.
    pub fn new() -> Self {
        let mut registry = CapabilityRegistry::new();
        registry.load(&CoreExtension);
        Self {
            environment: None,
            detector_count: 0,
            registry,
        }
    }

    /// Activate an environment and dispatch its start-up change.
    ///
    /// The previously active environment, if any, is replaced.
    pub fn start(&mut self, config: StartConfig) -> DispatchReport {
        let environment = config.environment.unwrap_or_default();
        info!("Starting environment '{}'", environment.name());

        if let Some(detector) = &config.initial_motion_detector {
            environment.add_detector(detector);
        }
        if let Some(notifier) = config.initial_notifier {
            environment.add_notifier(notifier);
        }

        let environment = self.environment.insert(environment);
        environment.announce_start()
    }

    /// The active environment, `None` until the first `start`.
    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    fn active(&self) -> Result<&Environment> {
        self.environment.as_ref().ok_or(EngineError::NoEnvironment)
    }

    pub fn add_detector(&self, detector: &MotionDetector) -> Result<()> {
        self.active()?.add_detector(detector);
        Ok(())
    }

    pub fn add_notifier(&self, notifier: SharedNotifier) -> Result<()> {
        self.active()?.add_notifier(notifier);
        Ok(())
    }

    /// Remove a notifier from the active environment, pushing it
    /// "Removing Notifier..." first. `Ok(None)` if it was not registered.
    pub fn remove_notifier(&self, notifier: &dyn Notifier) -> Result<Option<PushedNotification>> {
        Ok(self.active()?.remove_notifier(notifier))
    }

    /// Load an extension. Returns `false` if it was already loaded.
    pub fn use_extension(&mut self, extension: &dyn Extension) -> bool {
        self.registry.load(extension)
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Detectors successfully constructed through this engine.
    pub fn count(&self) -> u64 {
        self.detector_count
    }

    /// Construct a synthetic detector, fed only through `send`.
    pub fn motion_detector(&mut self) -> MotionDetector {
        self.detector_count += 1;
        MotionDetector::new(self.detector_count, DetectorKind::Synthetic, None)
    }

    /// Construct a PIR detector. Needs an active environment.
    pub fn pir_detector(&mut self, pin: u8) -> Result<MotionDetector> {
        self.construct(DetectorKind::Pir { pin }, None)
    }

    /// Construct a detector from a registered kind.
    pub fn create_detector(&mut self, config: &CapabilityConfig) -> Result<MotionDetector> {
        let kind = self.registry.detector_kind(config)?;
        self.construct(kind, config.name.clone())
    }

    /// Build a notifier from a registered kind. It is not registered anywhere yet.
    pub fn create_notifier(&self, config: &CapabilityConfig) -> Result<SharedNotifier> {
        self.registry.build_notifier(config)
    }

    fn construct(&mut self, kind: DetectorKind, name: Option<String>) -> Result<MotionDetector> {
        if kind.is_hardware_bound() && self.environment.is_none() {
            return Err(EngineError::NoEnvironment);
        }
        self.detector_count += 1;
        Ok(MotionDetector::new(self.detector_count, kind, name))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
