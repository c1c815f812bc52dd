//! Hardware pin sources feeding PIR detectors.
//!
//! The bus never talks to GPIO directly. It consumes a [`PinSource`], an
//! abstract digital-input stream keyed by pin number:
//! - `simulation`: in-process pins, driven by tests or a random simulation task
//! - `mqtt`: pin levels published on an MQTT broker by a GPIO daemon

pub mod mqtt;
pub mod simulation;

pub use mqtt::MqttPins;
pub use simulation::{SimulatedPins, run_pin_simulation};

use crate::error::Result;
use tokio::sync::mpsc;

/// Source of digital level transitions (`true` = high = motion).
pub trait PinSource: Send + Sync {
    /// Start receiving levels for `pin`.
    ///
    /// A pin has at most one live subscriber; subscribing again while the
    /// first stream is still open fails with [`EngineError::PinSource`].
    ///
    /// [`EngineError::PinSource`]: crate::error::EngineError::PinSource
    fn subscribe(&self, pin: u8) -> Result<mpsc::UnboundedReceiver<bool>>;

    /// Stop delivering levels for `pin` and release it.
    fn unsubscribe(&self, pin: u8);
}
