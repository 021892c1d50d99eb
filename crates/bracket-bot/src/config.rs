//! Application configuration.
//!
//! Layers, lowest precedence first:
//! 1. built-in defaults
//! 2. TOML file (`-c`, `BRACKET_CONFIG`, or `config/default.toml` if present)
//! 3. environment variables, `BRACKET_<SECTION>__<KEY>` (e.g. `BRACKET_VENUE__PORT`)
//! 4. command line overrides

use crate::error::{AppError, AppResult};
use bracket_core::ContractTemplate;
use bracket_persistence::FileOrderIdAllocator;
use bracket_ws::{ConnectionConfig, WaitLimit};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Used when no config file is named.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "BRACKET";

/// Operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Orders are placed.
    #[default]
    Live,
    /// Everything up to submission runs; the bracket is only logged.
    DryRun,
}

/// Venue gateway location and handshake settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Fixed session id. Derived per run when unset.
    #[serde(default)]
    pub client_id: Option<u32>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7497
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_id: None,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Persistent order id counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIdConfig {
    #[serde(default = "default_order_id_path")]
    pub path: PathBuf,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_order_id_path() -> PathBuf {
    PathBuf::from(FileOrderIdAllocator::DEFAULT_PATH)
}

fn default_lock_timeout_ms() -> u64 {
    FileOrderIdAllocator::DEFAULT_LOCK_TIMEOUT.as_millis() as u64
}

impl Default for OrderIdConfig {
    fn default() -> Self {
        Self {
            path: default_order_id_path(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Bounds on blocking waits. `None` waits forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub resolve_timeout_ms: Option<u64>,
    #[serde(default)]
    pub price_timeout_ms: Option<u64>,
}

fn default_poll_interval_ms() -> u64 {
    50
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            resolve_timeout_ms: None,
            price_timeout_ms: None,
        }
    }
}

impl WaitConfig {
    fn limit(&self, timeout_ms: Option<u64>) -> WaitLimit {
        let limit =
            WaitLimit::unbounded().with_poll_interval(Duration::from_millis(self.poll_interval_ms));
        match timeout_ms {
            Some(ms) => limit.with_timeout(Duration::from_millis(ms)),
            None => limit,
        }
    }

    pub fn resolve_limit(&self) -> WaitLimit {
        self.limit(self.resolve_timeout_ms)
    }

    pub fn price_limit(&self) -> WaitLimit {
        self.limit(self.price_timeout_ms)
    }
}

/// Post-submission behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitConfig {
    /// Time the session stays open after the stop is queued, so that
    /// immediate rejections are observed before disconnecting.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_settle_ms() -> u64 {
    1_000
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub venue: VenueConfig,
    #[serde(default)]
    pub order_ids: OrderIdConfig,
    /// Lookup template applied to the bare symbol.
    #[serde(default)]
    pub contract: ContractTemplate,
    #[serde(default)]
    pub waits: WaitConfig,
    #[serde(default)]
    pub submit: SubmitConfig,
}

/// Command line values that take precedence over every other layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub client_id: Option<u32>,
    pub dry_run: bool,
}

impl AppConfig {
    /// Load defaults, the config file and `BRACKET_*` environment variables.
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::from(Path::new(DEFAULT_CONFIG_PATH)).required(false),
        };

        let config: Self = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .ignore_empty(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(host) = &overrides.host {
            self.venue.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.venue.port = port;
        }
        if let Some(client_id) = overrides.client_id {
            self.venue.client_id = Some(client_id);
        }
        if overrides.dry_run {
            self.mode = RunMode::DryRun;
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.venue.host.trim().is_empty() {
            return Err(AppError::Config("venue.host must not be empty".to_string()));
        }
        if self.venue.port == 0 {
            return Err(AppError::Config("venue.port must not be 0".to_string()));
        }
        if self.venue.connect_timeout_ms == 0 {
            return Err(AppError::Config(
                "venue.connect_timeout_ms must be positive".to_string(),
            ));
        }
        if self.order_ids.path.as_os_str().is_empty() {
            return Err(AppError::Config("order_ids.path must not be empty".to_string()));
        }
        if self.waits.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "waits.poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_dry_run(&self) -> bool {
        self.mode == RunMode::DryRun
    }

    pub fn connection_config(&self, client_id: u32) -> ConnectionConfig {
        ConnectionConfig {
            connect_timeout: Duration::from_millis(self.venue.connect_timeout_ms),
            poll_interval: Duration::from_millis(self.waits.poll_interval_ms),
            ..ConnectionConfig::for_gateway(&self.venue.host, self.venue.port, client_id)
        }
    }

    pub fn order_id_allocator(&self) -> FileOrderIdAllocator {
        FileOrderIdAllocator::new(&self.order_ids.path)
            .with_lock_timeout(Duration::from_millis(self.order_ids.lock_timeout_ms))
    }

    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.submit.settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bracket_core::SecType;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.mode, RunMode::Live);
        assert_eq!(config.venue.host, "127.0.0.1");
        assert_eq!(config.venue.port, 7497);
        assert_eq!(config.venue.client_id, None);
        assert_eq!(config.order_ids.path, PathBuf::from(".order_id"));
        assert_eq!(config.order_ids.lock_timeout_ms, 10_000);
        assert_eq!(config.contract.exchange, "GLOBEX");
        assert_eq!(config.waits.poll_interval_ms, 50);
        assert_eq!(config.submit.settle_ms, 1_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shipped_config_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let config = AppConfig::load(Some(Path::new(path))).unwrap();

        assert_eq!(config.mode, RunMode::Live);
        assert_eq!(config.venue.port, 7497);
        assert_eq!(config.contract.sec_type, SecType::Future);
        assert!(config.waits.resolve_timeout_ms.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_layers_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
mode = "dry_run"

[venue]
port = 4002
client_id = 17

[waits]
price_timeout_ms = 2500
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();

        assert!(config.is_dry_run());
        assert_eq!(config.venue.port, 4002);
        assert_eq!(config.venue.client_id, Some(17));
        assert_eq!(config.venue.host, "127.0.0.1");
        assert_eq!(config.waits.price_limit().timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.waits.resolve_limit().timeout, None);
    }

    #[test]
    fn test_env_overrides_file() {
        // Only this test touches the order id lock timeout.
        std::env::set_var("BRACKET_ORDER_IDS__LOCK_TIMEOUT_MS", "2500");
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let loaded = AppConfig::load(Some(Path::new(path)));
        std::env::remove_var("BRACKET_ORDER_IDS__LOCK_TIMEOUT_MS");

        let config = loaded.unwrap();
        assert_eq!(config.order_ids.lock_timeout_ms, 2500);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/bracket.toml")));
        assert!(matches!(result, Err(AppError::ConfigLoad(_))));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = AppConfig::default();
        config.apply_overrides(&ConfigOverrides {
            host: Some("10.0.0.5".to_string()),
            port: Some(4001),
            client_id: Some(3),
            dry_run: true,
        });

        assert_eq!(config.venue.host, "10.0.0.5");
        assert_eq!(config.venue.port, 4001);
        assert_eq!(config.venue.client_id, Some(3));
        assert!(config.is_dry_run());

        let connection = config.connection_config(3);
        assert_eq!(connection.url, "ws://10.0.0.5:4001");
        assert_eq!(connection.client_id, 3);
        assert_eq!(connection.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.venue.port = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = AppConfig::default();
        config.waits.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.order_ids.path = PathBuf::new();
        assert!(config.validate().is_err());
    }
}
