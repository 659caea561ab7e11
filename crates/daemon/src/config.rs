//! Configuration management for the Conductor daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/conductor/config.toml`.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("password must not be empty")]
    EmptyPassword,

    #[error("listen_addr must be a socket address like 0.0.0.0:8080, got {0}")]
    InvalidListenAddr(String),

    #[error("shell not found: {0}")]
    InvalidShellPath(String),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("max_sessions must be between 1 and 1000, got {0}")]
    InvalidMaxSessions(usize),

    #[error("output_queue_capacity must be greater than 0")]
    InvalidQueueCapacity,

    #[error("token_ttl_secs must be greater than 0")]
    InvalidTokenTtl,

    #[error("sweep_interval_secs must be greater than 0")]
    InvalidSweepInterval,

    #[error("bcrypt_cost must be between 4 and 31, got {0}")]
    InvalidBcryptCost(u32),

    #[error("ping_interval_secs must be greater than 0")]
    InvalidPingInterval,

    #[error("pong_wait_secs ({pong_wait}) must exceed ping_interval_secs ({ping_interval})")]
    InvalidPongWait { pong_wait: u64, ping_interval: u64 },

    #[error("write_wait_secs must be greater than 0")]
    InvalidWriteWait,
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Password used when none is configured.
pub const DEFAULT_PASSWORD: &str = "admin";

/// Main configuration structure for the Conductor daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// HTTP listener configuration.
    pub server: ServerConfig,

    /// Session management configuration.
    pub session: SessionConfig,

    /// Authentication settings.
    pub auth: AuthConfig,

    /// Streaming connection heartbeat settings.
    pub transport: TransportConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory for daemon state; history logs go under `sessions/`.
    pub data_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// PID file location. Defaults to `<data_dir>/daemon.pid`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid_file: Option<PathBuf>,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind, `host:port`.
    pub listen_addr: String,
}

/// Session management configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Shell to launch for new sessions.
    pub shell: String,

    /// Value of `TERM` given to the shell.
    pub term: String,

    /// Maximum number of concurrent sessions.
    pub max_sessions: usize,

    /// Per-viewer output queue capacity, in chunks.
    pub output_queue_capacity: usize,
}

/// Authentication settings.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared login password.
    pub password: String,

    /// Lifetime of issued tokens, in seconds.
    pub token_ttl_secs: u64,

    /// How often expired tokens are evicted, in seconds.
    pub sweep_interval_secs: u64,

    /// bcrypt work factor used to hash the password at startup.
    pub bcrypt_cost: u32,
}

/// Heartbeat settings for streaming connections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Interval between pings, in seconds.
    pub ping_interval_secs: u64,

    /// A connection with no pong for this long is dropped, in seconds.
    pub pong_wait_secs: u64,

    /// Bound on a single outbound write, in seconds.
    pub write_wait_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
            pid_file: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            term: "xterm-256color".to_string(),
            max_sessions: 32,
            output_queue_capacity: 256,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password: DEFAULT_PASSWORD.to_string(),
            token_ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 5 * 60,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("password", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 30,
            pong_wait_secs: 60,
            write_wait_secs: 10,
        }
    }
}

impl AuthConfig {
    /// Token lifetime.
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    /// Sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("conductor")
        .join("config.toml")
}

/// Returns the default data directory path.
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("conductor")
}

/// Returns `$SHELL`, else the first common shell on `PATH`, else `/bin/sh`.
fn default_shell() -> String {
    if let Ok(shell) = std::env::var("SHELL") {
        if !shell.is_empty() {
            return shell;
        }
    }
    ["bash", "zsh", "sh"]
        .iter()
        .find_map(|name| which::which(name).ok())
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_else(|| "/bin/sh".to_string())
}

/// Returns whether `shell` names an existing executable.
fn shell_exists(shell: &str) -> bool {
    let path = Path::new(shell);
    if path.is_absolute() {
        path.exists()
    } else {
        which::which(shell).is_ok()
    }
}

impl Config {
    /// Directory holding one history log per session.
    pub fn history_dir(&self) -> PathBuf {
        self.daemon.data_dir.join("sessions")
    }

    /// Resolved PID file location.
    pub fn pid_file_path(&self) -> PathBuf {
        self.daemon
            .pid_file
            .clone()
            .unwrap_or_else(|| self.daemon.data_dir.join("daemon.pid"))
    }

    /// Parsed listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .listen_addr
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddr(self.server.listen_addr.clone()))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Empty values are ignored. Supported variables:
    /// - CONDUCTOR_PASSWORD: Override the login password
    /// - CONDUCTOR_ADDR: Override the listen address
    /// - CONDUCTOR_DATA_DIR: Override the data directory
    /// - CONDUCTOR_SHELL: Override the session shell
    /// - CONDUCTOR_PID_FILE: Override the PID file location
    /// - CONDUCTOR_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Some(password) = env_override("CONDUCTOR_PASSWORD") {
            tracing::info!("Overriding password from environment");
            self.auth.password = password;
        }

        if let Some(addr) = env_override("CONDUCTOR_ADDR") {
            tracing::info!("Overriding listen_addr from environment: {}", addr);
            self.server.listen_addr = addr;
        }

        if let Some(dir) = env_override("CONDUCTOR_DATA_DIR") {
            tracing::info!("Overriding data_dir from environment: {}", dir);
            self.daemon.data_dir = PathBuf::from(dir);
        }

        if let Some(shell) = env_override("CONDUCTOR_SHELL") {
            tracing::info!("Overriding shell from environment: {}", shell);
            self.session.shell = shell;
        }

        if let Some(pid_file) = env_override("CONDUCTOR_PID_FILE") {
            tracing::info!("Overriding pid_file from environment: {}", pid_file);
            self.daemon.pid_file = Some(PathBuf::from(pid_file));
        }

        if let Some(level) = env_override("CONDUCTOR_LOG_LEVEL") {
            tracing::info!("Overriding log_level from environment: {}", level);
            self.daemon.log_level = level;
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error for the first value outside its valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.password.is_empty() {
            return Err(ConfigError::EmptyPassword);
        }

        self.listen_addr()?;

        if !shell_exists(&self.session.shell) {
            return Err(ConfigError::InvalidShellPath(self.session.shell.clone()));
        }

        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        if self.session.max_sessions < 1 || self.session.max_sessions > 1000 {
            return Err(ConfigError::InvalidMaxSessions(self.session.max_sessions));
        }

        if self.session.output_queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }

        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidTokenTtl);
        }

        if self.auth.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidSweepInterval);
        }

        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(ConfigError::InvalidBcryptCost(self.auth.bcrypt_cost));
        }

        let transport = &self.transport;
        if transport.ping_interval_secs == 0 {
            return Err(ConfigError::InvalidPingInterval);
        }
        if transport.pong_wait_secs <= transport.ping_interval_secs {
            return Err(ConfigError::InvalidPongWait {
                pong_wait: transport.pong_wait_secs,
                ping_interval: transport.ping_interval_secs,
            });
        }
        if transport.write_wait_secs == 0 {
            return Err(ConfigError::InvalidWriteWait);
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Reads a non-empty environment variable.
fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "CONDUCTOR_PASSWORD",
        "CONDUCTOR_ADDR",
        "CONDUCTOR_DATA_DIR",
        "CONDUCTOR_SHELL",
        "CONDUCTOR_PID_FILE",
        "CONDUCTOR_LOG_LEVEL",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            std::env::remove_var(name);
        }
    }

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.session.shell = "/bin/sh".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.daemon.log_level, "info");
        assert_eq!(config.daemon.pid_file, None);
        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.session.term, "xterm-256color");
        assert_eq!(config.session.max_sessions, 32);
        assert_eq!(config.session.output_queue_capacity, 256);
        assert_eq!(config.auth.password, DEFAULT_PASSWORD);
        assert_eq!(config.auth.token_ttl(), Duration::from_secs(86400));
        assert_eq!(config.auth.sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.auth.bcrypt_cost, 12);
        assert_eq!(config.transport, TransportConfig::default());
        assert!(!config.session.shell.is_empty());
    }

    #[test]
    fn test_derived_paths() {
        let mut config = Config::default();
        config.daemon.data_dir = PathBuf::from("/srv/conductor");

        assert_eq!(config.history_dir(), PathBuf::from("/srv/conductor/sessions"));
        assert_eq!(config.pid_file_path(), PathBuf::from("/srv/conductor/daemon.pid"));

        config.daemon.pid_file = Some(PathBuf::from("/run/conductor.pid"));
        assert_eq!(config.pid_file_path(), PathBuf::from("/run/conductor.pid"));
    }

    #[test]
    fn test_from_toml_empty() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
[server]
listen_addr = "127.0.0.1:9000"

[session]
max_sessions = 5
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.server.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.session.max_sessions, 5);
        assert_eq!(config.session.output_queue_capacity, 256);
        assert_eq!(config.auth, AuthConfig::default());
    }

    #[test]
    fn test_from_toml_full() {
        let toml = r#"
[daemon]
data_dir = "/custom/data"
log_level = "trace"
pid_file = "/run/conductor.pid"

[server]
listen_addr = "[::1]:8443"

[session]
shell = "/bin/zsh"
term = "screen"
max_sessions = 20
output_queue_capacity = 64

[auth]
password = "s3cret"
token_ttl_secs = 3600
sweep_interval_secs = 60
bcrypt_cost = 6

[transport]
ping_interval_secs = 10
pong_wait_secs = 25
write_wait_secs = 5
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.daemon.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.daemon.log_level, "trace");
        assert_eq!(config.pid_file_path(), PathBuf::from("/run/conductor.pid"));
        assert_eq!(config.listen_addr().unwrap().port(), 8443);
        assert_eq!(config.session.shell, "/bin/zsh");
        assert_eq!(config.session.term, "screen");
        assert_eq!(config.session.max_sessions, 20);
        assert_eq!(config.session.output_queue_capacity, 64);
        assert_eq!(config.auth.password, "s3cret");
        assert_eq!(config.auth.token_ttl_secs, 3600);
        assert_eq!(config.auth.sweep_interval_secs, 60);
        assert_eq!(config.auth.bcrypt_cost, 6);
        assert_eq!(config.transport.ping_interval_secs, 10);
        assert_eq!(config.transport.pong_wait_secs, 25);
        assert_eq!(config.transport.write_wait_secs, 5);
    }

    #[test]
    fn test_from_toml_invalid_syntax() {
        let toml = r#"
[daemon
log_level = "debug"
"#;
        let err = Config::from_toml(toml).unwrap_err().to_string();
        assert!(err.contains("Invalid TOML"));
    }

    #[test]
    fn test_from_toml_wrong_type() {
        let toml = r#"
[session]
max_sessions = "not a number"
"#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn test_roundtrip_custom() {
        let mut original = Config::default();
        original.daemon.log_level = "warn".to_string();
        original.daemon.pid_file = Some(PathBuf::from("/tmp/c.pid"));
        original.session.max_sessions = 42;
        original.auth.password = "pw".to_string();

        let toml = original.to_toml().unwrap();
        let loaded = Config::from_toml(&toml).unwrap();

        assert_eq!(original, loaded);
    }

    #[test]
    fn test_load_missing_file() {
        let config = Config::load("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = Config::default();
        original.server.listen_addr = "127.0.0.1:7000".to_string();

        original.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();

        assert_eq!(original, loaded);
    }

    #[test]
    fn test_load_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "invalid [ toml").unwrap();

        let err = Config::load(&config_path).unwrap_err().to_string();
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("conductor/config.toml"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = Config::default();
        config.auth.password = "correct-horse".to_string();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("correct-horse"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("CONDUCTOR_PASSWORD", "from-env");
        std::env::set_var("CONDUCTOR_ADDR", "127.0.0.1:9999");
        std::env::set_var("CONDUCTOR_DATA_DIR", "/tmp/conductor-env");
        std::env::set_var("CONDUCTOR_SHELL", "/bin/sh");
        std::env::set_var("CONDUCTOR_PID_FILE", "/tmp/conductor-env.pid");
        std::env::set_var("CONDUCTOR_LOG_LEVEL", "debug");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.auth.password, "from-env");
        assert_eq!(config.server.listen_addr, "127.0.0.1:9999");
        assert_eq!(config.daemon.data_dir, PathBuf::from("/tmp/conductor-env"));
        assert_eq!(config.session.shell, "/bin/sh");
        assert_eq!(config.pid_file_path(), PathBuf::from("/tmp/conductor-env.pid"));
        assert_eq!(config.daemon.log_level, "debug");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_override_empty_does_not_override() {
        clear_env();
        std::env::set_var("CONDUCTOR_PASSWORD", "");
        std::env::set_var("CONDUCTOR_ADDR", "");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config, Config::default());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_override_unset_does_not_override() {
        clear_env();

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config, Config::default());
    }

    #[test]
    #[serial]
    fn test_default_shell_prefers_env() {
        let saved = std::env::var("SHELL").ok();

        std::env::set_var("SHELL", "/usr/bin/fish");
        assert_eq!(default_shell(), "/usr/bin/fish");

        std::env::set_var("SHELL", "");
        assert!(!default_shell().is_empty());

        match saved {
            Some(shell) => std::env::set_var("SHELL", shell),
            None => std::env::remove_var("SHELL"),
        }
    }

    #[test]
    fn test_validate_default_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_password() {
        let mut config = valid_config();
        config.auth.password.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyPassword));
    }

    #[test]
    fn test_validate_listen_addr() {
        let mut config = valid_config();
        config.server.listen_addr = "localhost".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidListenAddr("localhost".to_string()))
        );
    }

    #[test]
    fn test_validate_shell() {
        let mut config = valid_config();
        config.session.shell = "/nonexistent/shell".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidShellPath(_))));

        config.session.shell = "definitely-not-a-real-shell-xyz".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidShellPath(_))));

        config.session.shell = "sh".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = valid_config();
        config.daemon.log_level = "verbose".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel("verbose".to_string()))
        );

        config.daemon.log_level = "WARN".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_sessions() {
        let mut config = valid_config();
        config.session.max_sessions = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidMaxSessions(0)));

        config.session.max_sessions = 1001;
        assert_eq!(config.validate(), Err(ConfigError::InvalidMaxSessions(1001)));

        config.session.max_sessions = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_limits() {
        let mut config = valid_config();
        config.session.output_queue_capacity = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidQueueCapacity));

        let mut config = valid_config();
        config.auth.token_ttl_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidTokenTtl));

        let mut config = valid_config();
        config.auth.sweep_interval_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSweepInterval));

        let mut config = valid_config();
        config.transport.ping_interval_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidPingInterval));

        let mut config = valid_config();
        config.transport.write_wait_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidWriteWait));
    }

    #[test]
    fn test_validate_bcrypt_cost_range() {
        let mut config = valid_config();
        config.auth.bcrypt_cost = 3;
        assert_eq!(config.validate(), Err(ConfigError::InvalidBcryptCost(3)));

        config.auth.bcrypt_cost = 32;
        assert_eq!(config.validate(), Err(ConfigError::InvalidBcryptCost(32)));

        config.auth.bcrypt_cost = 4;
        assert!(config.validate().is_ok());
        config.auth.bcrypt_cost = 31;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_pong_wait_exceeds_ping_interval() {
        let mut config = valid_config();
        config.transport.ping_interval_secs = 30;
        config.transport.pong_wait_secs = 30;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidPongWait {
                pong_wait: 30,
                ping_interval: 30
            })
        );
    }
}
