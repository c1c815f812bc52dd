//! Capability registry for late-bound extensions.
//!
//! An [`Extension`] is a bundle of notifier and detector constructors keyed by
//! a `kind` tag. Loading one into an [`Engine`](super::Engine) (either with
//! `engine.use_extension(&ext)` or `ext.use_in(&mut engine)`) appends its
//! constructors to the table; the engine then builds channels and detectors
//! from a [`CapabilityConfig`] by looking up `config.kind`.
//!
//! Loading is idempotent: extensions are remembered by name and a kind that
//! is already registered is never replaced.

use super::Engine;
use crate::detectors::DetectorKind;
use crate::error::{EngineError, Result};
use crate::notifiers::{BaseNotifier, LogNotifier, SharedNotifier};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub type NotifierConstructor = Arc<dyn Fn(&CapabilityConfig) -> Result<SharedNotifier> + Send + Sync>;
pub type DetectorConstructor = Arc<dyn Fn(&CapabilityConfig) -> Result<DetectorKind> + Send + Sync>;

/// Description of one notifier or detector to build.
///
/// Which fields are required depends on the kind: `slack` needs `url`,
/// `pir` needs `pin`, everything else only reads the optional `name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityConfig {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<u8>,
    /// Program override for command-backed channels (speech).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl CapabilityConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_pin(mut self, pin: u8) -> Self {
        self.pin = Some(pin);
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn name_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(default)
    }

    pub fn require_url(&self) -> Result<&str> {
        self.url.as_deref().ok_or_else(|| self.missing("url"))
    }

    pub fn require_pin(&self) -> Result<u8> {
        self.pin.ok_or_else(|| self.missing("pin"))
    }

    fn missing(&self, option: &'static str) -> EngineError {
        EngineError::MissingOption {
            kind: self.kind.clone(),
            option,
        }
    }
}

/// A bundle of capabilities that can be loaded into an engine after start-up.
pub trait Extension {
    /// Unique name used to keep loading idempotent.
    fn name(&self) -> &str;

    /// Append this extension's constructors to the registry.
    fn register_into(&self, registry: &mut CapabilityRegistry);

    /// Reciprocal of [`Engine::use_extension`].
    fn use_in(&self, engine: &mut Engine) -> bool
    where
        Self: Sized,
    {
        engine.use_extension(self)
    }
}

/// Table of constructors contributed by loaded extensions.
#[derive(Default)]
pub struct CapabilityRegistry {
    extensions: BTreeSet<String>,
    notifiers: BTreeMap<String, NotifierConstructor>,
    detectors: BTreeMap<String, DetectorConstructor>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an extension. Returns `false` if it was already loaded.
    pub fn load(&mut self, extension: &dyn Extension) -> bool {
        let name = extension.name();
        if self.extensions.contains(name) {
            debug!("Extension '{}' already loaded", name);
            return false;
        }
        self.extensions.insert(name.to_string());
        extension.register_into(self);
        info!("Loaded extension '{}'", name);
        true
    }

    pub fn is_loaded(&self, extension: &str) -> bool {
        self.extensions.contains(extension)
    }

    /// Register a notifier constructor. An existing kind is kept as is.
    pub fn register_notifier<F>(&mut self, kind: &str, constructor: F) -> bool
    where
        F: Fn(&CapabilityConfig) -> Result<SharedNotifier> + Send + Sync + 'static,
    {
        if self.notifiers.contains_key(kind) {
            return false;
        }
        self.notifiers.insert(kind.to_string(), Arc::new(constructor));
        true
    }

    /// Register a detector constructor. An existing kind is kept as is.
    pub fn register_detector<F>(&mut self, kind: &str, constructor: F) -> bool
    where
        F: Fn(&CapabilityConfig) -> Result<DetectorKind> + Send + Sync + 'static,
    {
        if self.detectors.contains_key(kind) {
            return false;
        }
        self.detectors.insert(kind.to_string(), Arc::new(constructor));
        true
    }

    pub fn notifier_kinds(&self) -> impl Iterator<Item = &str> {
        self.notifiers.keys().map(String::as_str)
    }

    pub fn detector_kinds(&self) -> impl Iterator<Item = &str> {
        self.detectors.keys().map(String::as_str)
    }

    pub fn build_notifier(&self, config: &CapabilityConfig) -> Result<SharedNotifier> {
        let constructor = self
            .notifiers
            .get(&config.kind)
            .ok_or_else(|| EngineError::UnknownNotifierKind(config.kind.clone()))?;
        constructor(config)
    }

    pub fn detector_kind(&self, config: &CapabilityConfig) -> Result<DetectorKind> {
        let constructor = self
            .detectors
            .get(&config.kind)
            .ok_or_else(|| EngineError::UnknownDetectorKind(config.kind.clone()))?;
        constructor(config)
    }
}

/// Channels and detectors every engine ships with.
pub struct CoreExtension;

impl Extension for CoreExtension {
    fn name(&self) -> &str {
        "core"
    }

    fn register_into(&self, registry: &mut CapabilityRegistry) {
        registry.register_notifier("base", |config| {
            Ok(Arc::new(BaseNotifier::new(config.name_or("Base Notifier"))) as SharedNotifier)
        });
        registry.register_notifier("log", |config| {
            Ok(Arc::new(LogNotifier::new(config.name_or("Log Notifier"))) as SharedNotifier)
        });
        registry.register_detector("motion", |_| Ok(DetectorKind::Synthetic));
        registry.register_detector("pir", |config| {
            Ok(DetectorKind::Pir {
                pin: config.require_pin()?,
            })
        });
    }
}
