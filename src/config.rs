// src/config.rs

use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_source_url")]
    pub url: String,
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
    /// Recorded as `discovered_by` and used for the skip check
    #[serde(default = "default_source_tag")]
    pub tag: String,
}

fn default_source_url() -> String { "https://crt.sh".to_string() }
fn default_source_timeout() -> u64 { 60 }
fn default_source_tag() -> String { "pycrtsh".to_string() }

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            timeout_secs: default_source_timeout(),
            tag: default_source_tag(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconcileConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Run-log category stamped after a completed run
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_workers() -> usize { 8 }
fn default_category() -> String { "asset_discovery".to_string() }

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            category: default_category(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub enabled: bool,
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "postgresql://localhost/ctinventory".to_string()
}

fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

fn default_state_file() -> String { "ct-inventory.toml".to_string() }

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub secret: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotificationsConfig {
    /// Operator channel (summaries and errors)
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
    /// Downstream audience for newly discovered certificates
    #[serde(default)]
    pub client_webhook: Option<WebhookConfig>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&contents)?;

        if cfg.reconcile.workers == 0 {
            anyhow::bail!("reconcile.workers must be greater than 0");
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_config_from_valid_toml() {
        let temp_file = write_config(
            r#"
[source]
url = "https://crt.internal"
timeout_secs = 30
tag = "crtsh"

[reconcile]
workers = 4
category = "ssl_discovery"

[database]
enabled = true
url = "postgresql://db/assets"
max_connections = 5

[inventory]
state_file = "test-inventory.toml"

[notifications.webhook]
url = "https://ops.example.com/hook"
secret = "test_secret"
timeout_secs = 5

[notifications.client_webhook]
url = "https://client.example.com/hook"

[logging]
level = "debug"
        "#,
        );

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.source.url, "https://crt.internal");
        assert_eq!(config.source.timeout_secs, 30);
        assert_eq!(config.source.tag, "crtsh");
        assert_eq!(config.reconcile.workers, 4);
        assert_eq!(config.reconcile.category, "ssl_discovery");
        assert!(config.database.enabled);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.inventory.state_file, "test-inventory.toml");

        let webhook = config.notifications.webhook.as_ref().unwrap();
        assert_eq!(webhook.url, "https://ops.example.com/hook");
        assert_eq!(webhook.secret, Some("test_secret".to_string()));
        assert_eq!(webhook.timeout_secs, Some(5));

        let client = config.notifications.client_webhook.as_ref().unwrap();
        assert_eq!(client.secret, None);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_config_minimal_toml() {
        let temp_file = write_config(
            r#"
[logging]
level = "info"
        "#,
        );

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.source.url, "https://crt.sh");
        assert_eq!(config.source.tag, "pycrtsh");
        assert_eq!(config.reconcile.workers, 8);
        assert_eq!(config.reconcile.category, "asset_discovery");
        assert!(!config.database.enabled);
        assert_eq!(config.inventory.state_file, "ct-inventory.toml");
        assert!(config.notifications.webhook.is_none());
        assert!(config.notifications.client_webhook.is_none());
    }

    #[test]
    fn test_config_invalid_toml() {
        let temp_file = write_config("invalid toml content {{{");
        assert!(Config::from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_config_missing_logging_section() {
        let temp_file = write_config(
            r#"
[source]
tag = "crtsh"
        "#,
        );

        assert!(Config::from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_config_zero_workers_rejected() {
        let temp_file = write_config(
            r#"
[reconcile]
workers = 0

[logging]
level = "info"
        "#,
        );

        assert!(Config::from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_config_nonexistent_file() {
        let result = Config::from_file(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }
}
