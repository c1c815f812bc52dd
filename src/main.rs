use clap::Parser;
use log::{error, info, warn};
use motion_bus::config::{Config, PinSourceConfig, load_dotenv};
use motion_bus::input::{MqttPins, PinSource, SimulatedPins, run_pin_simulation};
use motion_bus::notifiers::{SlackExtension, SpeechExtension};
use motion_bus::{Engine, Environment, Extension, StartConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "motion-bus", about = "Fan motion sensor changes out to notifiers")]
struct Args {
    /// JSON configuration file
    #[arg(short, long, env = "MOTION_BUS_CONFIG")]
    config: Option<PathBuf>,

    /// Drive hardware detectors from simulated pins, whatever the config says
    #[arg(long)]
    simulate: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    load_dotenv();
    init_logger();
    let args = Args::parse();
    info!("Starting motion bus");

    let mut config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if args.simulate && config.pin_source == PinSourceConfig::Mqtt {
        config.pin_source = PinSourceConfig::Simulated { interval_secs: 30 };
    }
    info!("Configuration loaded:");
    info!("  Environment: {}", config.environment_name);
    info!("  Detectors: {}", config.detectors.len());
    info!("  Notifiers: {}", config.notifiers.len());

    let mut engine = Engine::new();
    SpeechExtension.use_in(&mut engine);
    engine.use_extension(&SlackExtension);

    // Notifiers go in before start so they hear the start-up change
    let environment = Environment::named(&config.environment_name);
    for notifier_config in &config.notifiers {
        match engine.create_notifier(notifier_config) {
            Ok(notifier) => environment.add_notifier(notifier),
            Err(e) => warn!("Skipping notifier '{}': {}", notifier_config.kind, e),
        }
    }
    engine.start(StartConfig::default().with_environment(environment));

    let mut detectors = Vec::new();
    for detector_config in &config.detectors {
        let registered = engine
            .create_detector(detector_config)
            .and_then(|detector| engine.add_detector(&detector).map(|()| detector));
        match registered {
            Ok(detector) => detectors.push(detector),
            Err(e) => warn!("Skipping detector '{}': {}", detector_config.kind, e),
        }
    }

    let (source, source_task): (Arc<dyn PinSource>, _) = match &config.pin_source {
        PinSourceConfig::Simulated { interval_secs } => {
            info!("Using simulated pins every {}s", interval_secs);
            let pins = Arc::new(SimulatedPins::new());
            let task = run_pin_simulation(
                pins.clone(),
                config.hardware_pins(),
                Duration::from_secs((*interval_secs).max(1)),
            );
            (pins as Arc<dyn PinSource>, task)
        }
        PinSourceConfig::Mqtt => {
            info!(
                "Using MQTT pins at {}:{} under '{}'",
                config.mqtt.broker_host, config.mqtt.broker_port, config.mqtt.topic_prefix
            );
            let (pins, task) = MqttPins::spawn(&config.mqtt);
            (pins as Arc<dyn PinSource>, task)
        }
    };

    let monitors: Vec<_> = detectors
        .iter()
        .filter(|d| d.kind().is_hardware_bound())
        .filter_map(|d| match d.start_monitoring(source.clone()) {
            Ok(monitor) => Some(monitor),
            Err(e) => {
                error!("Failed to monitor {}: {}", d.name(), e);
                None
            }
        })
        .collect();

    info!("Motion bus is running");
    info!("  - Monitoring {} pin(s)", monitors.len());
    info!("  - Press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    drop(monitors);
    source_task.abort();
    info!("Motion bus stopped");
}
