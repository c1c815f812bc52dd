//! MQTT client wrapper routing pin topics to subscribers.

use crate::config::MqttConfig;
use crate::error::{EngineError, Result};
use crate::input::PinSource;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type PinChannels = Arc<Mutex<HashMap<u8, mpsc::UnboundedSender<bool>>>>;

/// Pin source backed by an MQTT broker.
pub struct MqttPins {
    client: AsyncClient,
    topic_prefix: String,
    channels: PinChannels,
}

impl MqttPins {
    /// Connect to the broker and spawn the event loop task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: &MqttConfig) -> (Arc<Self>, JoinHandle<()>) {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);
        let channels = PinChannels::default();
        let prefix = config.topic_prefix.trim_end_matches('/').to_string();

        let task = tokio::spawn(run_event_loop(event_loop, prefix.clone(), channels.clone()));
        let pins = Arc::new(Self {
            client,
            topic_prefix: prefix,
            channels,
        });
        (pins, task)
    }

    fn topic(&self, pin: u8) -> String {
        format!("{}/{}", self.topic_prefix, pin)
    }
}

impl PinSource for MqttPins {
    fn subscribe(&self, pin: u8) -> Result<mpsc::UnboundedReceiver<bool>> {
        let mut channels = self.channels.lock();
        if channels.get(&pin).is_some_and(|tx| !tx.is_closed()) {
            return Err(EngineError::PinSource(format!(
                "pin {} is already subscribed",
                pin
            )));
        }

        let topic = self.topic(pin);
        info!("Subscribing to MQTT topic: {}", topic);
        self.client
            .try_subscribe(topic, QoS::AtLeastOnce)
            .map_err(|e| EngineError::PinSource(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        channels.insert(pin, tx);
        Ok(rx)
    }

    fn unsubscribe(&self, pin: u8) {
        self.channels.lock().remove(&pin);
        if let Err(e) = self.client.try_unsubscribe(self.topic(pin)) {
            warn!("Failed to unsubscribe pin {}: {}", pin, e);
        }
    }
}

/// Poll the broker forever and forward pin levels to their subscribers.
async fn run_event_loop(mut event_loop: EventLoop, prefix: String, channels: PinChannels) {
    info!("Starting MQTT event loop");

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let Some(pin) = pin_from_topic(&prefix, &publish.topic) else {
                    continue;
                };
                let payload = match std::str::from_utf8(&publish.payload) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!("Invalid UTF-8 in MQTT payload: {}", e);
                        continue;
                    }
                };
                let Some(level) = parse_level(payload) else {
                    warn!("Unrecognized level '{}' for pin {}", payload, pin);
                    continue;
                };

                debug!("Pin {} level {}", pin, level);
                if let Some(tx) = channels.lock().get(&pin) {
                    let _ = tx.send(level);
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT connection error: {:?}", e);
                // Wait before reconnecting
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

/// Extract the pin number from `<prefix>/<pin>`.
pub fn pin_from_topic(prefix: &str, topic: &str) -> Option<u8> {
    topic
        .strip_prefix(prefix)?
        .strip_prefix('/')?
        .parse()
        .ok()
}

/// Parse a pin level payload. Accepts `1/0`, `true/false`, `on/off`, `high/low`.
pub fn parse_level(payload: &str) -> Option<bool> {
    match payload.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "high" => Some(true),
        "0" | "false" | "off" | "low" => Some(false),
        _ => None,
    }
}
