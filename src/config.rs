//! # Configuration
//!
//! One [`NetworkConfig`] drives connectors, bindings and synchronizers.
//!
//! ## Sources
//! - TOML via [`NetworkConfig::from_file`] / [`NetworkConfig::from_toml`];
//!   missing sections fall back to their defaults
//! - `NETSYNC_*` environment variables via [`NetworkConfig::from_env`]
//! - plain construction, or [`NetworkConfig::default_with_overrides`]
//!
//! ## Limits worth knowing
//! - `transport.max_frame_size` bounds what one peer can make us buffer
//! - `server.admission_timeout` bounds how long undecided connections linger

use crate::core::serialization::SerializationFormat;
use crate::error::{ProtocolError, Result};
use crate::protocol::auth::AuthFailurePolicy;
use crate::utils::compression::CompressionKind;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Default cap on a single frame's payload (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Default listening port
pub const DEFAULT_PORT: u16 = 7777;

/// Frame caps above this are refused by validation
const MAX_FRAME_SIZE_LIMIT: usize = 256 * 1024 * 1024;

const MAX_APP_NAME_LEN: usize = 64;

/// Everything configurable, grouped by concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub transport: TransportConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::ConfigError(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ProtocolError::ConfigError(format!("Invalid TOML: {e}")))
    }

    /// Defaults, overridden by whichever `NETSYNC_*` variables are set.
    ///
    /// # Errors
    /// `ProtocolError::ConfigError` naming the first variable that is set but
    /// does not parse
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(address) = std::env::var("NETSYNC_BIND_ADDRESS") {
            config.server.bind_address = address;
        }
        if let Some(port) = env_value("NETSYNC_PORT")? {
            config.server.port = port;
        }
        if let Some(size) = env_value("NETSYNC_MAX_FRAME_SIZE")? {
            config.transport.max_frame_size = size;
        }
        if let Some(ms) = env_value("NETSYNC_CONNECT_TIMEOUT_MS")? {
            config.client.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_value("NETSYNC_ADMISSION_TIMEOUT_MS")? {
            config.server.admission_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }

    pub fn default_with_overrides<F>(apply: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        apply(&mut config);
        config
    }

    /// The default configuration rendered as TOML, for bootstrapping a file
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Cannot encode config: {e}")))?;
        std::fs::write(path, text).map_err(|e| {
            ProtocolError::ConfigError(format!("Cannot write {}: {e}", path.display()))
        })
    }

    /// Every problem found, one readable line each. Empty means usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = self.server.validate();
        problems.extend(self.client.validate());
        problems.extend(self.transport.validate());
        problems.extend(self.logging.validate());
        problems
    }

    /// [`validate`](Self::validate), folded into one `ConfigError`
    pub fn validate_strict(&self) -> Result<()> {
        let problems = self.validate();
        if problems.is_empty() {
            return Ok(());
        }
        Err(ProtocolError::ConfigError(format!(
            "{} configuration problem(s): {}",
            problems.len(),
            problems.join("; ")
        )))
    }
}

fn env_value<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ProtocolError::ConfigError(format!("{name}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}

fn check_duration(problems: &mut Vec<String>, what: &str, value: Duration, min: Duration, max: Duration) {
    if value < min {
        problems.push(format!("{what} below {}ms", min.as_millis()));
    } else if value > max {
        problems.push(format!("{what} above {}s", max.as_secs()));
    }
}

/// Listening side
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind, as an IP address
    pub bind_address: String,
    pub port: u16,
    /// How long an inbound connection may wait for the admission hook
    #[serde(with = "millis")]
    pub admission_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            admission_timeout: timeout::ADMISSION_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.bind_address.is_empty() {
            problems.push("server.bind_address is empty".to_string());
        } else if self.bind_address.parse::<std::net::IpAddr>().is_err() {
            problems.push(format!(
                "server.bind_address {:?} is not an IP address",
                self.bind_address
            ));
        }
        if self.port == 0 {
            problems.push("server.port must not be 0".to_string());
        }
        check_duration(
            &mut problems,
            "server.admission_timeout",
            self.admission_timeout,
            Duration::from_millis(10),
            Duration::from_secs(300),
        );

        problems
    }
}

/// Connecting side
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub address: String,
    #[serde(with = "millis")]
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{DEFAULT_PORT}"),
            connect_timeout: timeout::DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.address.is_empty() {
            problems.push("client.address is empty".to_string());
        }
        check_duration(
            &mut problems,
            "client.connect_timeout",
            self.connect_timeout,
            Duration::from_millis(100),
            Duration::from_secs(300),
        );

        problems
    }
}

/// Framing and payload pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Largest payload one frame may announce, in bytes
    pub max_frame_size: usize,
    pub serialization: SerializationFormat,
    pub compression: CompressionKind,
    /// Tell the sender when one of its messages could not be handled
    pub reply_with_errors: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            serialization: SerializationFormat::default(),
            compression: CompressionKind::default(),
            reply_with_errors: true,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Vec<String> {
        if self.max_frame_size == 0 {
            vec!["transport.max_frame_size must not be 0".to_string()]
        } else if self.max_frame_size > MAX_FRAME_SIZE_LIMIT {
            vec![format!(
                "transport.max_frame_size {} exceeds {MAX_FRAME_SIZE_LIMIT}",
                self.max_frame_size
            )]
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Fate of a peer whose credentials are rejected
    pub failure_policy: AuthFailurePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub app_name: String,
    /// Used when `RUST_LOG` is not set
    #[serde(with = "level")]
    pub log_level: Level,
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: "netsync".to_string(),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        if self.app_name.is_empty() {
            vec!["logging.app_name is empty".to_string()]
        } else if self.app_name.len() > MAX_APP_NAME_LEN {
            vec![format!(
                "logging.app_name is {} characters, at most {MAX_APP_NAME_LEN} allowed",
                self.app_name.len()
            )]
        } else {
            Vec::new()
        }
    }
}

/// `Duration` as whole milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// `tracing::Level` as its lowercase name
mod level {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(value: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.as_str().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(|_| de::Error::custom(format!("unknown log level {name:?}")))
    }
}
