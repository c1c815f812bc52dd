//! MQTT pin source.
//!
//! A GPIO daemon on the sensor host publishes pin levels to
//! `<topic_prefix>/<pin>`; this module turns those messages into pin streams.

mod client;

pub use client::{MqttPins, parse_level, pin_from_topic};
