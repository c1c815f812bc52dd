//! Motion-detection event bus.
//!
//! Detectors report readings, an [`Environment`] turns changes into
//! notifications and fans them out to every registered [`Notifier`].
//! The [`Engine`] is the explicit context holding the single active
//! environment, the detector construction count and the capability registry.
//!
//! ```
//! use motion_bus::notifiers::LogNotifier;
//! use motion_bus::{Engine, StartConfig};
//! use std::sync::Arc;
//!
//! let mut engine = Engine::new();
//! let detector = engine.motion_detector();
//! engine.start(
//!     StartConfig::default()
//!         .with_detector(detector.clone())
//!         .with_notifier(Arc::new(LogNotifier::default())),
//! );
//! assert!(detector.send(1));
//! assert_eq!(engine.environment().unwrap().dispatch_rounds(), 2);
//! ```

pub mod config;
pub mod detectors;
pub mod engine;
pub mod environment;
pub mod error;
pub mod input;
pub mod notifiers;

pub use detectors::{DetectorKind, Monitor, MotionDetector, Reading};
pub use engine::{CapabilityConfig, Engine, Extension, StartConfig};
pub use environment::{DispatchReport, Environment, EnvironmentOptions};
pub use error::{DeliveryError, EngineError, Result};
pub use notifiers::{Notification, Notifier, PushedNotification, SharedNotifier};
