//! Configuration for the mudcore engine
//!
//! Loaded the same way the daemon configs are: compiled-in defaults, then an
//! optional file, then `MUDCORE_`-prefixed environment variables.

use crate::ids::EntityId;
use serde::{Deserialize, Serialize};

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Permission hierarchy, lowest first
    #[serde(default = "default_hierarchy")]
    pub hierarchy: Vec<String>,

    /// Priority given to an actor's default command set
    #[serde(default)]
    pub default_set_priority: i32,

    /// Identity that bypasses every lock
    #[serde(default)]
    pub superuser_id: Option<EntityId>,

    /// Dispatcher configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            hierarchy: default_hierarchy(),
            default_set_priority: 0,
            superuser_id: None,
            dispatch: DispatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&CoreConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MUDCORE")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

/// What the dispatcher does with a command whose `cmd` lock cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedLockPolicy {
    /// Hide the command exactly like an ordinary lock failure
    Omit,
    /// Hide the command, and report `AccessDenied` if the input named it
    #[default]
    Deny,
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Supervising timeout for a single command execution
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,

    #[serde(default)]
    pub malformed_lock_policy: MalformedLockPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout(),
            malformed_lock_policy: MalformedLockPolicy::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_hierarchy() -> Vec<String> {
    ["Guest", "Player", "Helper", "Builder", "Admin", "Developer"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_command_timeout() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}
