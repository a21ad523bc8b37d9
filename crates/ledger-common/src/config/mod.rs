//! Unified configuration for the ledger.
//!
//! A single TOML-loadable struct, the "one source of truth" for every
//! deployable knob the ledger reads at startup.

pub mod bind;

pub use crate::config::bind::BindConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A statically-provisioned secret record, as loaded from the `[bootstrap_secrets.*]`
/// table in the config file. Mirrors `ledger_secrets::SecretRecord`'s shape;
/// duplicated here rather than depended on, since `ledger-secrets` depends on
/// this crate and not the other way around.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BootstrapSecretConfig {
    pub kid: String,
    pub token: String,
    #[serde(default)]
    pub prev_kid: Option<String>,
    #[serde(default)]
    pub prev_token: Option<String>,
}

fn default_region() -> String {
    "eu-central-1".to_string()
}

fn default_ttl_s() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_output() -> String {
    "console".to_string()
}

fn default_log_path() -> String {
    "logs/ledger.log".to_string()
}

fn default_sqlite() -> String {
    "ledger.db".to_string()
}

fn default_bootstrap_ts_window() -> u64 {
    60
}

fn default_instance_ts_window() -> u64 {
    300
}

/// The ledger's main configuration struct. Loaded from a TOML file, then
/// overridden field-by-field from environment variables (see
/// [`LedgerConfig::apply_env_overrides`]).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Instance name, used in logs and as the default tracing span name.
    pub name: String,

    /// Deployment environment: "dev", "prod", or "test". Affects logging
    /// defaults and a couple of validation checks, nothing functional.
    #[serde(default = "default_environment")]
    pub env: String,

    /// HTTP bind configuration.
    #[serde(default)]
    pub bind: BindConfig,

    /// SQLite database file path for the registry, nonce, and secret-cache
    /// tables.
    #[serde(default = "default_sqlite")]
    pub sqlite: String,

    /// Default region recorded on a service when the register request
    /// doesn't specify one.
    #[serde(default = "default_region")]
    pub default_region: String,

    /// Default `ttl_s` (secret cache TTL) applied when a register request
    /// doesn't specify one.
    #[serde(default = "default_ttl_s")]
    pub default_ttl_s: u64,

    /// Allowed clock skew for bootstrap-token requests, in seconds.
    #[serde(default = "default_bootstrap_ts_window")]
    pub bootstrap_ts_window_secs: u64,

    /// Allowed clock skew for per-instance signed requests, in seconds.
    #[serde(default = "default_instance_ts_window")]
    pub instance_ts_window_secs: u64,

    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output target: "console" or "file".
    #[serde(default = "default_log_output")]
    pub log_output: String,

    /// Log file path, used when `log_output = "file"`.
    #[serde(default = "default_log_path")]
    pub log_path: String,

    /// Include internal error detail (`dev` field) in error responses.
    /// Should be false in production.
    #[serde(default)]
    pub debug: bool,

    /// Statically-provisioned secrets, keyed by `bootstrap_secret_ref`, for
    /// standalone operation without a remote secret manager. Loaded into the
    /// in-memory `SecretBackend` at startup.
    #[serde(default)]
    pub bootstrap_secrets: HashMap<String, BootstrapSecretConfig>,
}

fn default_environment() -> String {
    "dev".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            name: "ledger".to_string(),
            env: default_environment(),
            bind: BindConfig::default(),
            sqlite: default_sqlite(),
            default_region: default_region(),
            default_ttl_s: default_ttl_s(),
            bootstrap_ts_window_secs: default_bootstrap_ts_window(),
            instance_ts_window_secs: default_instance_ts_window(),
            log_level: default_log_level(),
            log_output: default_log_output(),
            log_path: default_log_path(),
            debug: false,
            bootstrap_secrets: HashMap::new(),
        }
    }
}

impl LedgerConfig {
    /// Load from a TOML file on disk.
    pub fn from_file<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let path_ref = path.as_ref();
        if !path_ref.is_file() {
            return Err(format!("configuration file does not exist: {path_ref:?}").into());
        }
        let content = std::fs::read_to_string(path_ref)?;
        let mut config: LedgerConfig = toml::from_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: LedgerConfig = toml::from_str(content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Overrides a handful of operational knobs from the environment,
    /// matching the pattern of the same-named variables in the deployment
    /// that originated this service.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DEBUG") {
            self.debug = matches!(v.as_str(), "1" | "true" | "TRUE" | "yes");
        }
        if let Ok(v) = std::env::var("MS_REGION") {
            self.default_region = v;
        }
        if let Ok(v) = std::env::var("LEDGER_SQLITE") {
            self.sqlite = v;
        }
        if let Ok(v) = std::env::var("LEDGER_BIND_PORT")
            && let Ok(port) = v.parse()
        {
            self.bind.http.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("instance name cannot be empty".to_string());
        }
        if !["dev", "prod", "test"].contains(&self.env.as_str()) {
            errors.push(format!(
                "invalid environment '{}', must be one of: dev, prod, test",
                self.env
            ));
        }
        if !["trace", "debug", "info", "warn", "error"].contains(&self.log_level.as_str()) {
            errors.push(format!("invalid log level '{}'", self.log_level));
        }
        if !["console", "file"].contains(&self.log_output.as_str()) {
            errors.push(format!(
                "invalid log output '{}', must be 'console' or 'file'",
                self.log_output
            ));
        }
        if self.sqlite.trim().is_empty() {
            errors.push("sqlite database path cannot be empty".to_string());
        }
        if self.bootstrap_ts_window_secs == 0 {
            errors.push("bootstrap_ts_window_secs must be greater than zero".to_string());
        }
        if self.instance_ts_window_secs == 0 {
            errors.push("instance_ts_window_secs must be greater than zero".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    pub fn is_console_logging(&self) -> bool {
        self.log_output == "console"
    }
}
