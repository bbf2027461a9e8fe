// src/notifier.rs
use crate::config::{NotificationsConfig, WebhookConfig};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Fire-and-forget message delivery
///
/// Callers log failures; a failed notification never fails a run.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Message to the operators
    async fn notify(&self, subject: &str, body: &str, important: bool) -> anyhow::Result<()>;

    /// Message to the downstream audience owning `domain`
    async fn notify_external(&self, domain: &str, subject: &str, body: &str)
        -> anyhow::Result<()>;
}

#[derive(Serialize)]
pub struct NotificationPayload<'a> {
    pub subject: &'a str,
    pub body: &'a str,
    pub important: bool,
    pub domain: Option<&'a str>,
}

/// Webhook delivery with optional HMAC-SHA256 signing
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    operators: Option<WebhookConfig>,
    clients: Option<WebhookConfig>,
}

impl WebhookNotifier {
    pub fn new(cfg: &NotificationsConfig) -> Self {
        Self {
            client: Client::new(),
            operators: cfg.webhook.clone(),
            clients: cfg.client_webhook.clone(),
        }
    }

    async fn post(&self, cfg: &WebhookConfig, payload: &NotificationPayload<'_>) -> anyhow::Result<()> {
        let body = serde_json::to_vec(payload)?;

        let timeout_secs = cfg.timeout_secs.unwrap_or(5);
        let mut req = self
            .client
            .post(&cfg.url)
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .body(body.clone())
            .header("Content-Type", "application/json");

        // Optional HMAC signature header
        if let Some(secret) = &cfg.secret {
            req = req.header("X-CTInventory-Signature", sign(secret, &body)?);
        }

        let resp = req.send().await?;
        resp.error_for_status()?; // non-2xx -> error

        Ok(())
    }
}

fn log_message(subject: &str, body: &str, important: bool) {
    if important {
        warn!("{}\n{}", subject, body);
    } else {
        info!("{}\n{}", subject, body);
    }
}

fn sign(secret: &str, body: &[u8]) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("HMAC init error: {:?}", e))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl NotificationChannel for WebhookNotifier {
    async fn notify(&self, subject: &str, body: &str, important: bool) -> anyhow::Result<()> {
        let Some(cfg) = &self.operators else {
            log_message(subject, body, important);
            return Ok(());
        };

        let payload = NotificationPayload {
            subject,
            body,
            important,
            domain: None,
        };
        self.post(cfg, &payload).await
    }

    async fn notify_external(
        &self,
        domain: &str,
        subject: &str,
        body: &str,
    ) -> anyhow::Result<()> {
        let Some(cfg) = &self.clients else {
            debug!("No client webhook configured, not notifying {}", domain);
            return Ok(());
        };

        let payload = NotificationPayload {
            subject,
            body,
            important: false,
            domain: Some(domain),
        };
        self.post(cfg, &payload).await
    }
}

/// Writes notifications to the log only
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationChannel for LogNotifier {
    async fn notify(&self, subject: &str, body: &str, important: bool) -> anyhow::Result<()> {
        log_message(subject, body, important);
        Ok(())
    }

    async fn notify_external(
        &self,
        domain: &str,
        subject: &str,
        body: &str,
    ) -> anyhow::Result<()> {
        info!("[{}] {}\n{}", domain, subject, body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hook(server: &MockServer, secret: Option<&str>, timeout_secs: u64) -> WebhookConfig {
        WebhookConfig {
            url: format!("{}/hook", server.uri()),
            secret: secret.map(str::to_string),
            timeout_secs: Some(timeout_secs),
        }
    }

    #[tokio::test]
    async fn test_notify_posts_payload() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(serde_json::json!({
                "subject": "INFO - done",
                "body": "No new SSL certificates discovered.",
                "important": false,
                "domain": null
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(&NotificationsConfig {
            webhook: Some(hook(&server, None, 5)),
            client_webhook: None,
        });

        let result = notifier
            .notify("INFO - done", "No new SSL certificates discovered.", false)
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_notify_external_uses_client_hook() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header_exists("X-CTInventory-Signature"))
            .and(body_json(serde_json::json!({
                "subject": "New SSL Certificate discovered!",
                "body": "1 new",
                "important": false,
                "domain": "example.com"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(&NotificationsConfig {
            webhook: None,
            client_webhook: Some(hook(&server, Some("client_secret"), 5)),
        });

        let result = notifier
            .notify_external("example.com", "New SSL Certificate discovered!", "1 new")
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unconfigured_channels_are_noops() {
        let notifier = WebhookNotifier::new(&NotificationsConfig::default());

        assert!(notifier.notify("subject", "body", true).await.is_ok());
        assert!(notifier.notify_external("example.com", "s", "b").await.is_ok());
    }

    #[tokio::test]
    async fn test_notify_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(&NotificationsConfig {
            webhook: Some(hook(&server, None, 5)),
            client_webhook: None,
        });

        assert!(notifier.notify("subject", "body", true).await.is_err());
    }

    #[tokio::test]
    async fn test_notify_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(10)))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(&NotificationsConfig {
            webhook: Some(hook(&server, None, 1)),
            client_webhook: None,
        });

        assert!(notifier.notify("subject", "body", false).await.is_err());
    }

    #[test]
    fn test_signature_is_hex_sha256() {
        let sig = sign("my_secret", b"{\"subject\":\"x\"}").unwrap();

        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(sig, sign("my_secret", b"{\"subject\":\"x\"}").unwrap());
        assert_ne!(sig, sign("other_secret", b"{\"subject\":\"x\"}").unwrap());
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLog {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[tokio::test]
    async fn test_unconfigured_operator_hook_logs_body() {
        let captured = CapturedLog::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let notifier = WebhookNotifier::new(&NotificationsConfig::default());
        notifier
            .notify("ERROR - failed", "Stage: discovery\nError: timed out", true)
            .await
            .unwrap();

        let text = captured.text();
        assert!(text.contains("WARN"));
        assert!(text.contains("ERROR - failed"));
        assert!(text.contains("Stage: discovery"));
        assert!(text.contains("Error: timed out"));
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let notifier = LogNotifier;
        assert!(notifier.notify("subject", "body", true).await.is_ok());
        assert!(notifier.notify_external("example.com", "s", "b").await.is_ok());
    }
}
