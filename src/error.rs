use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum EngineError {
    #[error("No environment was detected, please add one first.")]
    NoEnvironment,

    #[error("Detector '{0}' is not bound to a hardware pin and cannot be monitored")]
    NotMonitorable(String),

    #[error("No async runtime available to drive pin monitoring")]
    NoRuntime,

    #[error("Pin source error: {0}")]
    PinSource(String),

    #[error("Unknown notifier kind: {0}")]
    UnknownNotifierKind(String),

    #[error("Unknown detector kind: {0}")]
    UnknownDetectorKind(String),

    #[error("Missing option '{option}' for {kind}")]
    MissingOption { kind: String, option: &'static str },

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

/// Failure of a single notifier delivery.
///
/// Never escapes a dispatch round: the round logs it, records it in the
/// report and moves on to the next notifier.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Webhook call failed: {0}")]
    Webhook(String),

    #[error("Invalid webhook URL: {0}")]
    InvalidWebhookUrl(String),

    #[error("Speech rendering failed: {0}")]
    Speech(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
