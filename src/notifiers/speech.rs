//! Speech synthesis channel.

use super::{Notification, Notifier, PushSignal, SharedNotifier};
use crate::engine::registry::{CapabilityRegistry, Extension};
use crate::error::DeliveryError;
use log::debug;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Renders text as audio. Fire-and-forget: `speak` returns once rendering
/// has been started.
pub trait SpeechRenderer: Send + Sync {
    fn speak(&self, text: &str) -> Result<(), DeliveryError>;
}

/// Speech through the platform's text-to-speech command.
#[derive(Debug, Clone)]
pub struct CommandSpeech {
    program: String,
    args: Vec<String>,
}

impl CommandSpeech {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Split a configured command line such as `espeak -s 120` into the
    /// program and its leading arguments.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).with_args(parts))
    }

    fn command(&self, text: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }

    fn spawn_error(&self, e: std::io::Error) -> DeliveryError {
        DeliveryError::Speech(format!("{}: {}", self.program, e))
    }
}

impl Default for CommandSpeech {
    fn default() -> Self {
        #[cfg(target_os = "macos")]
        {
            Self::new("say")
        }

        #[cfg(not(target_os = "macos"))]
        {
            Self::new("espeak")
        }
    }
}

impl SpeechRenderer for CommandSpeech {
    fn speak(&self, text: &str) -> Result<(), DeliveryError> {
        let mut command = self.command(text);

        let Ok(handle) = Handle::try_current() else {
            // Outside a runtime there is nothing to reap on; the child is
            // left to finish on its own
            command.spawn().map_err(|e| self.spawn_error(e))?;
            return Ok(());
        };

        let _runtime = handle.enter();
        let mut child = tokio::process::Command::from(command)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let program = self.program.clone();
        handle.spawn(async move {
            match child.wait().await {
                Ok(status) => debug!("{} exited with {}", program, status),
                Err(e) => debug!("{} wait failed: {}", program, e),
            }
        });
        Ok(())
    }
}

/// Speaks every notification text.
pub struct SpeechNotifier {
    name: String,
    renderer: Arc<dyn SpeechRenderer>,
    signal: PushSignal,
}

impl SpeechNotifier {
    pub fn new() -> Self {
        Self::with_renderer("Speech Notifier", Arc::new(CommandSpeech::default()))
    }

    pub fn with_renderer(name: impl Into<String>, renderer: Arc<dyn SpeechRenderer>) -> Self {
        Self {
            name: name.into(),
            renderer,
            signal: PushSignal::new(),
        }
    }
}

impl Default for SpeechNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for SpeechNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        self.renderer.speak(&notification.text)
    }

    fn signal(&self) -> &PushSignal {
        &self.signal
    }
}

/// Adds the `speech` notifier kind.
pub struct SpeechExtension;

impl Extension for SpeechExtension {
    fn name(&self) -> &str {
        "speech"
    }

    fn register_into(&self, registry: &mut CapabilityRegistry) {
        registry.register_notifier("speech", |config| {
            let renderer = config
                .command
                .as_deref()
                .and_then(CommandSpeech::from_command_line)
                .unwrap_or_default();
            Ok(Arc::new(SpeechNotifier::with_renderer(
                config.name_or("Speech Notifier"),
                Arc::new(renderer),
            )) as SharedNotifier)
        });
    }
}
