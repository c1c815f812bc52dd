//! Simulated pins for testing and hardware-less runs.

use super::PinSource;
use crate::error::{EngineError, Result};
use log::{debug, info};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, interval};

/// Chance that a simulated pin reads high on a tick.
const MOTION_PROBABILITY: f64 = 0.3;

/// In-process pin source. Levels are pushed with [`SimulatedPins::set_level`].
#[derive(Default)]
pub struct SimulatedPins {
    channels: Mutex<HashMap<u8, mpsc::UnboundedSender<bool>>>,
}

impl SimulatedPins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a level to the pin's subscriber. Returns `false` if nobody listens.
    pub fn set_level(&self, pin: u8, level: bool) -> bool {
        let channels = self.channels.lock();
        match channels.get(&pin) {
            Some(tx) => tx.send(level).is_ok(),
            None => false,
        }
    }

    pub fn is_subscribed(&self, pin: u8) -> bool {
        self.channels.lock().contains_key(&pin)
    }
}

impl PinSource for SimulatedPins {
    fn subscribe(&self, pin: u8) -> Result<mpsc::UnboundedReceiver<bool>> {
        let mut channels = self.channels.lock();
        if let Some(existing) = channels.get(&pin) {
            if !existing.is_closed() {
                return Err(EngineError::PinSource(format!(
                    "pin {} is already subscribed",
                    pin
                )));
            }
            debug!("[Sim] pin {} stream was closed, resubscribing", pin);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        channels.insert(pin, tx);
        Ok(rx)
    }

    fn unsubscribe(&self, pin: u8) {
        self.channels.lock().remove(&pin);
    }
}

/// Spawn a task that randomly drives the given pins every `period`.
///
/// # Returns
///
/// A `JoinHandle` that can be used to abort the simulation task.
pub fn run_pin_simulation(
    pins: Arc<SimulatedPins>,
    pin_numbers: Vec<u8>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval(period);
        loop {
            interval.tick().await;
            for &pin in &pin_numbers {
                let level = rand::thread_rng().gen_bool(MOTION_PROBABILITY);
                if pins.set_level(pin, level) {
                    info!("[Sim] pin {} -> {}", pin, if level { "high" } else { "low" });
                }
            }
        }
    })
}
