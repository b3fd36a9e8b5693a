//! Relay configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;
use validator::Validate;

use crate::AppResult;

/// Relay configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Config {
    /// Server configuration.
    #[validate(nested)]
    pub server: ServerConfig,
    /// Task queue configuration.
    #[serde(default)]
    #[validate(nested)]
    pub queue: QueueConfig,
    /// Outbound delivery configuration.
    #[serde(default)]
    #[validate(nested)]
    pub delivery: DeliveryConfig,
    /// Inbox configuration.
    #[serde(default)]
    #[validate(nested)]
    pub inbox: InboxConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public scheme of this relay (`https` in production).
    #[validate(length(min = 1, message = "no scheme given"))]
    pub scheme: String,
    /// Public hostname of this relay.
    #[validate(length(min = 1, message = "no hostname given"))]
    pub hostname: String,
    /// Path to the PEM encoded public key.
    #[validate(length(min = 1, message = "no public key path given"))]
    pub public_key: String,
    /// Path to the PEM encoded private key.
    #[validate(length(min = 1, message = "no private key path given"))]
    pub private_key: String,
}

/// Task queue configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QueueConfig {
    /// Number of task ids the hand-off channel holds before `enqueue` waits.
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub capacity: usize,
    /// Number of delivery workers.
    #[serde(default = "default_workers")]
    #[validate(range(min = 1))]
    pub workers: usize,
}

/// Outbound delivery configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DeliveryConfig {
    /// Request timeout applied to the delivery HTTP client.
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
    /// User agent sent with deliveries.
    #[serde(default = "default_user_agent")]
    #[validate(length(min = 1))]
    pub user_agent: String,
    /// Retries after a failed delivery. Zero keeps deliveries single-shot.
    #[serde(default)]
    #[validate(range(max = 32))]
    pub max_retries: u32,
    /// Delay before the first retry.
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: u64,
    /// Upper bound for the retry delay.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

/// Inbox configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InboxConfig {
    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    #[validate(range(min = 1))]
    pub max_body_bytes: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON formatted log lines.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_queue_capacity() -> usize {
    1
}

const fn default_workers() -> usize {
    4
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("ferry/{}", env!("CARGO_PKG_VERSION"))
}

const fn default_initial_backoff_secs() -> u64 {
    30
}

const fn default_max_backoff_secs() -> u64 {
    3600
}

const fn default_max_body_bytes() -> usize {
    16 * (1 << 20)
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            workers: default_workers(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            max_retries: 0,
            initial_backoff_secs: default_initial_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Server settings with the default bind address.
    #[must_use]
    pub fn new(scheme: &str, hostname: &str, public_key: &str, private_key: &str) -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            scheme: scheme.to_string(),
            hostname: hostname.to_string(),
            public_key: public_key.to_string(),
            private_key: private_key.to_string(),
        }
    }
}

impl DeliveryConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Configuration with every section but `server` at its defaults.
    #[must_use]
    pub fn new(server: ServerConfig) -> Self {
        Self {
            server,
            queue: QueueConfig::default(),
            delivery: DeliveryConfig::default(),
            inbox: InboxConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `FERRY_ENV`)
    /// 4. Environment variables with `FERRY__` prefix
    pub fn load() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        let env = std::env::var("FERRY_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("FERRY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::checked(config.try_deserialize()?)
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("FERRY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::checked(config.try_deserialize()?)
    }

    fn checked(config: Self) -> AppResult<Self> {
        config.validate()?;
        config.base_url()?;
        Ok(config)
    }

    /// Public base URL of this relay, built from scheme and hostname.
    pub fn base_url(&self) -> AppResult<Url> {
        let url = Url::parse(&format!(
            "{}://{}/",
            self.server.scheme, self.server.hostname
        ))?;
        Ok(url)
    }

    /// Absolute URL of a route on this relay, with an optional fragment.
    pub fn route_url(&self, path: &str, fragment: Option<&str>) -> AppResult<Url> {
        let mut url = self.base_url()?.join(path)?;
        url.set_fragment(fragment);
        Ok(url)
    }

    /// The shared inbox IRI that Follow activities must target.
    pub fn inbox_url(&self) -> AppResult<Url> {
        self.route_url("/inbox", None)
    }

    /// The relay actor IRI.
    pub fn actor_url(&self) -> AppResult<Url> {
        self.route_url("/actor", None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(scheme: &str, hostname: &str) -> Config {
        Config::new(ServerConfig::new(
            scheme,
            hostname,
            "keys/public.pem",
            "keys/private.pem",
        ))
    }

    #[test]
    fn test_defaults() {
        let config = config("https", "www.example.org");
        assert_eq!(config.queue.capacity, 1);
        assert_eq!(config.inbox.max_body_bytes, 16 * 1024 * 1024);
        assert_eq!(config.delivery.max_retries, 0);
        assert!(config.delivery.user_agent.starts_with("ferry/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inbox_url() {
        let config = config("https", "www.example.org");
        assert_eq!(
            config.inbox_url().unwrap().as_str(),
            "https://www.example.org/inbox"
        );
        assert_eq!(
            config
                .route_url("/actor", Some("main-key"))
                .unwrap()
                .as_str(),
            "https://www.example.org/actor#main-key"
        );
    }

    #[test]
    fn test_missing_fields_fail_validation() {
        assert!(config("https", "").validate().is_err());
        assert!(config("", "www.example.org").validate().is_err());

        let mut no_key = config("https", "www.example.org");
        no_key.server.private_key = String::new();
        assert!(no_key.validate().is_err());

        let mut no_capacity = config("https", "www.example.org");
        no_capacity.queue.capacity = 0;
        assert!(no_capacity.validate().is_err());
    }

    #[test]
    fn test_retry_budget_is_bounded() {
        let mut config = config("https", "www.example.org");
        config.delivery.max_retries = 32;
        assert!(config.validate().is_ok());

        config.delivery.max_retries = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = std::env::temp_dir().join(format!("ferry-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("relay.toml");
        std::fs::write(
            &path,
            r#"
[server]
scheme = "https"
hostname = "relay.example.org"
public_key = "pub.pem"
private_key = "priv.pem"

[queue]
capacity = 8
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.server.hostname, "relay.example.org");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.queue.capacity, 8);
        assert_eq!(config.queue.workers, 4);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_from_file_rejects_empty_hostname() {
        let dir = std::env::temp_dir().join(format!("ferry-config-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("relay.toml");
        std::fs::write(
            &path,
            r#"
[server]
scheme = "https"
hostname = ""
public_key = "pub.pem"
private_key = "priv.pem"
"#,
        )
        .unwrap();

        assert!(Config::from_file(&path).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
