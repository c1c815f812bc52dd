//! Chat webhook channel (Slack incoming webhooks).

use super::{Notification, Notifier, PushSignal, SharedNotifier};
use crate::engine::registry::{CapabilityRegistry, Extension};
use crate::error::DeliveryError;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

/// Outbound chat message delivery.
pub trait WebhookClient: Send + Sync {
    fn post_message(&self, url: &str, text: &str) -> Result<(), DeliveryError>;
}

/// Webhook client over `ureq`.
///
/// The POST runs on a background thread so the dispatch loop only pays for
/// starting it. Errors from the call itself are logged, not returned.
#[derive(Debug, Clone)]
pub struct UreqWebhook {
    timeout: Duration,
}

impl UreqWebhook {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Perform the POST on the current thread.
    pub fn post_blocking(&self, url: &str, text: &str) -> Result<(), DeliveryError> {
        validate_url(url)?;
        let response = ureq::post(url)
            .timeout(self.timeout)
            .send_json(serde_json::json!({ "text": text }))
            .map_err(|e| DeliveryError::Webhook(e.to_string()))?;
        debug!("Webhook answered with status {}", response.status());
        Ok(())
    }
}

impl Default for UreqWebhook {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl WebhookClient for UreqWebhook {
    fn post_message(&self, url: &str, text: &str) -> Result<(), DeliveryError> {
        validate_url(url)?;
        let client = self.clone();
        let url = url.to_string();
        let text = text.to_string();
        std::thread::Builder::new()
            .name("webhook-post".into())
            .spawn(move || {
                if let Err(e) = client.post_blocking(&url, &text) {
                    warn!("Webhook delivery to {} failed: {}", url, e);
                }
            })
            .map_err(|e| DeliveryError::Webhook(e.to_string()))?;
        Ok(())
    }
}

fn validate_url(url: &str) -> Result<(), DeliveryError> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(DeliveryError::InvalidWebhookUrl(url.to_string()))
    }
}

/// Posts every notification text to a chat webhook.
pub struct SlackNotifier {
    name: String,
    webhook_url: String,
    client: Arc<dyn WebhookClient>,
    signal: PushSignal,
}

impl SlackNotifier {
    pub fn new(name: impl Into<String>, webhook_url: impl Into<String>) -> Self {
        Self::with_client(name, webhook_url, Arc::new(UreqWebhook::default()))
    }

    pub fn with_client(
        name: impl Into<String>,
        webhook_url: impl Into<String>,
        client: Arc<dyn WebhookClient>,
    ) -> Self {
        Self {
            name: name.into(),
            webhook_url: webhook_url.into(),
            client,
            signal: PushSignal::new(),
        }
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }
}

impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        debug!("[{}] posting: {}", self.name, notification.text);
        self.client.post_message(&self.webhook_url, &notification.text)
    }

    fn signal(&self) -> &PushSignal {
        &self.signal
    }
}

/// Adds the `slack` notifier kind (`name` optional, `url` required).
pub struct SlackExtension;

impl Extension for SlackExtension {
    fn name(&self) -> &str {
        "slack"
    }

    fn register_into(&self, registry: &mut CapabilityRegistry) {
        registry.register_notifier("slack", |config| {
            let url = config.require_url()?;
            Ok(Arc::new(SlackNotifier::new(config.name_or("Slack"), url)) as SharedNotifier)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::Reading;
    use crate::engine::registry::CapabilityConfig;
    use crate::error::EngineError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(String, String)>>);

    impl WebhookClient for Outbox {
        fn post_message(&self, url: &str, text: &str) -> Result<(), DeliveryError> {
            self.0.lock().push((url.to_string(), text.to_string()));
            Ok(())
        }
    }

    struct Unreachable;

    impl WebhookClient for Unreachable {
        fn post_message(&self, _url: &str, _text: &str) -> Result<(), DeliveryError> {
            Err(DeliveryError::Webhook("connection refused".into()))
        }
    }

    #[test]
    fn test_posts_to_webhook() {
        let outbox = Arc::new(Outbox::default());
        let notifier =
            SlackNotifier::with_client("My Slack", "https://hooks.example/a", outbox.clone());

        let pushed = notifier.push(&Notification::motion("Door", Reading::MOTION));

        assert!(pushed.is_delivered());
        assert_eq!(pushed.notifier, "My Slack");
        assert_eq!(
            *outbox.0.lock(),
            vec![(
                "https://hooks.example/a".to_string(),
                "Motion detected by Door".to_string()
            )]
        );
    }

    #[test]
    fn test_failure_still_raises_signal() {
        let notifier = SlackNotifier::with_client(
            "My Slack",
            "https://hooks.example/a",
            Arc::new(Unreachable),
        );
        let raised = Arc::new(Mutex::new(None));
        let sink = raised.clone();
        notifier.on_pushed(move |pushed| *sink.lock() = Some(pushed.clone()));

        notifier.push(&Notification::startup("Hall"));

        let raised = raised.lock().clone().unwrap();
        assert_eq!(raised.notifier, "My Slack");
        assert_eq!(
            raised.outcome,
            Err(DeliveryError::Webhook("connection refused".into()))
        );
    }

    #[test]
    fn test_invalid_url_fails_before_spawning() {
        let client = UreqWebhook::default();
        assert_eq!(
            client.post_message("hooks.example/a", "hi"),
            Err(DeliveryError::InvalidWebhookUrl("hooks.example/a".into()))
        );
    }

    #[test]
    fn test_extension_requires_url() {
        let mut registry = CapabilityRegistry::new();
        SlackExtension.register_into(&mut registry);

        let err = registry
            .build_notifier(&CapabilityConfig::new("slack"))
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::MissingOption { option: "url", .. }));

        let notifier = registry
            .build_notifier(&CapabilityConfig::new("slack").with_url("https://hooks.example/b"))
            .ok()
            .unwrap();
        assert_eq!(notifier.name(), "Slack");
    }
}
