//! Gateway configuration, loaded from a TOML file.
//!
//! All durations are expressed in whole seconds in the file and exposed as
//! [`Duration`] accessors here. Configuration problems are fatal at boot,
//! never at runtime, so [`Config::load`] validates everything up front.

use std::{path::Path, time::Duration};

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration from {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub mails: MailsConfig,
    pub messages: MessagesConfig,
    pub api: ApiConfig,
    pub s3: S3Config,
    pub s3_emails: S3EmailsConfig,
    pub redis: RedisConfig,
    pub logger: LoggerConfig,
}

/// The `[server]` section: the listener and the session limits.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub domain: String,
    timeout_read: u64,
    timeout_write: u64,
    pub max_message_bytes: usize,
    pub max_recipients: usize,
    pub allow_insecure_auth: bool,
    /// When set the gateway only classifies and relays; nothing is parsed,
    /// persisted, or pushed to the backend, and the object store is never
    /// touched.
    pub relay_only: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 25,
            domain: "localhost".into(),
            timeout_read: 60,
            timeout_write: 60,
            max_message_bytes: 10 * 1024 * 1024,
            max_recipients: 50,
            allow_insecure_auth: false,
            relay_only: false,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub const fn timeout_read(&self) -> Duration {
        Duration::from_secs(self.timeout_read)
    }

    #[must_use]
    pub const fn timeout_write(&self) -> Duration {
        Duration::from_secs(self.timeout_write)
    }
}

/// The `[mails]` section: routing record cache behaviour.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MailsConfig {
    refresh_every: u64,
    ttl: u64,
}

impl Default for MailsConfig {
    fn default() -> Self {
        Self {
            refresh_every: 300,
            ttl: 3600,
        }
    }
}

impl MailsConfig {
    #[must_use]
    pub const fn refresh_every(&self) -> Duration {
        Duration::from_secs(self.refresh_every)
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }
}

/// The `[messages]` section: outbound queue polling.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    outbound_every: u64,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self { outbound_every: 60 }
    }
}

impl MessagesConfig {
    #[must_use]
    pub const fn outbound_every(&self) -> Duration {
        Duration::from_secs(self.outbound_every)
    }
}

/// The `[api]` section: the backend HTTP API.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub secret: String,
    timeout: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            secret: String::new(),
            timeout: 30,
        }
    }
}

impl ApiConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// The `[s3]` section: object store credentials.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// The `[s3_emails]` section: where message payloads land.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct S3EmailsConfig {
    pub bucket: String,
    pub acl: String,
}

impl Default for S3EmailsConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            acl: "private".into(),
        }
    }
}

/// The `[redis]` section: the shared routing cache store.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub addr: String,
    pub pass: String,
    pub db: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:6379".into(),
            pass: String::new(),
            db: 0,
        }
    }
}

impl RedisConfig {
    /// Connection URL in the form the redis client expects.
    #[must_use]
    pub fn url(&self) -> String {
        if self.pass.is_empty() {
            format!("redis://{}/{}", self.addr, self.db)
        } else {
            format!("redis://:{}@{}/{}", self.pass, self.addr, self.db)
        }
    }
}

/// The `[logger]` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Config {
    /// Read and validate the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.domain.is_empty() {
            return Err(ConfigError::Invalid("server.domain must be set".into()));
        }

        if self.server.timeout_read == 0 || self.server.timeout_write == 0 {
            return Err(ConfigError::Invalid(
                "server.timeout_read and server.timeout_write must be greater than zero".into(),
            ));
        }

        if self.mails.refresh_every == 0 || self.mails.ttl == 0 {
            return Err(ConfigError::Invalid(
                "mails.refresh_every and mails.ttl must be greater than zero".into(),
            ));
        }

        if self.messages.outbound_every == 0 {
            return Err(ConfigError::Invalid(
                "messages.outbound_every must be greater than zero".into(),
            ));
        }

        if self.api.base_url.is_empty() {
            return Err(ConfigError::Invalid("api.base_url must be set".into()));
        }

        if !self.server.relay_only && self.s3_emails.bucket.is_empty() {
            return Err(ConfigError::Invalid(
                "s3_emails.bucket must be set unless server.relay_only is enabled".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(content: &str) -> Config {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn full_configuration_parses() {
        let config = parse(
            r#"
            [server]
            host = "127.0.0.1"
            port = 2525
            domain = "mail.example.com"
            timeout_read = 30
            timeout_write = 30
            max_message_bytes = 1048576
            max_recipients = 10
            allow_insecure_auth = true
            relay_only = false

            [mails]
            refresh_every = 120
            ttl = 600

            [messages]
            outbound_every = 15

            [api]
            base_url = "http://localhost:4000"
            secret = "hunter2"
            timeout = 5

            [s3]
            region = "eu-west-1"
            access_key_id = "key"
            secret_access_key = "secret"

            [s3_emails]
            bucket = "emails"
            acl = "private"

            [redis]
            addr = "127.0.0.1:6379"
            pass = ""
            db = 2

            [logger]
            level = "debug"
            "#,
        );

        assert_eq!(config.server.address(), "127.0.0.1:2525");
        assert_eq!(config.server.timeout_read(), Duration::from_secs(30));
        assert_eq!(config.mails.refresh_every(), Duration::from_secs(120));
        assert_eq!(config.mails.ttl(), Duration::from_secs(600));
        assert_eq!(config.messages.outbound_every(), Duration::from_secs(15));
        assert_eq!(config.api.timeout(), Duration::from_secs(5));
        assert_eq!(config.redis.url(), "redis://127.0.0.1:6379/2");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn redis_url_includes_password_when_set() {
        let redis = RedisConfig {
            addr: "10.0.0.1:6379".into(),
            pass: "sekrit".into(),
            db: 0,
        };
        assert_eq!(redis.url(), "redis://:sekrit@10.0.0.1:6379/0");
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let config = parse(
            r#"
            [server]
            domain = "mail.example.com"

            [mails]
            refresh_every = 0

            [api]
            base_url = "http://localhost:4000"

            [s3_emails]
            bucket = "emails"
            "#,
        );

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn bucket_is_optional_in_relay_only_mode() {
        let config = parse(
            r#"
            [server]
            domain = "mail.example.com"
            relay_only = true

            [api]
            base_url = "http://localhost:4000"
            "#,
        );

        assert!(config.validate().is_ok());
    }
}
