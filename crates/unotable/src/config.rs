//! Server configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file
//! (`unotable.toml`, or the path in `UNOTABLE_CONFIG`), then environment
//! variables such as `UNOTABLE__BIND_ADDR=0.0.0.0:9000`.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use unotable_room::RegistryConfig;
use unotable_session::SessionConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_VAR: &str = "UNOTABLE_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "unotable.toml";
const ENV_PREFIX: &str = "UNOTABLE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind_addr: String,
    /// Game type served; sockets must target `/games/{game_type}/ws`.
    pub game_type: String,
    /// HS256 secret used to validate bearer tokens.
    pub jwt_secret: String,
    /// How long a dropped player keeps their seat.
    pub reconnect_grace_secs: u64,
    /// How often the grace-period sweeper runs.
    pub sweep_interval_ms: u64,
    /// Fresh room codes tried before `create_game` gives up.
    pub max_code_attempts: usize,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            game_type: "SOLO".to_string(),
            jwt_secret: String::new(),
            reconnect_grace_secs: SessionConfig::default().reconnect_grace_secs,
            sweep_interval_ms: 1000,
            max_code_attempts: RegistryConfig::default().max_code_attempts,
            log_filter: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the default file location and the
    /// environment. A missing file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(Path::new(&path), true),
            Err(_) => Self::from_file(Path::new(DEFAULT_CONFIG_FILE), false),
        }
    }

    /// Loads configuration from an explicit TOML file plus the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file(path.as_ref(), true)
    }

    fn from_file(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// The only request path the gateway accepts.
    pub fn ws_path(&self) -> String {
        format!("/games/{}/ws", self.game_type)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reconnect_grace_secs: self.reconnect_grace_secs,
        }
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            max_code_attempts: self.max_code_attempts,
            ..RegistryConfig::default()
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, body: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "unotable-{}-{name}.toml",
            std::process::id()
        ));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_default_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080");
        assert_eq!(cfg.game_type, "SOLO");
        assert_eq!(cfg.reconnect_grace_secs, 30);
        assert_eq!(cfg.max_code_attempts, 32);
        assert_eq!(cfg.log_filter, "info");
    }

    #[test]
    fn test_ws_path_uses_game_type() {
        let cfg = ServerConfig {
            game_type: "DUO".into(),
            ..ServerConfig::default()
        };
        assert_eq!(cfg.ws_path(), "/games/DUO/ws");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let path = write_temp(
            "overrides",
            "bind_addr = \"0.0.0.0:9000\"\nreconnect_grace_secs = 5\n",
        );
        let cfg = ServerConfig::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(cfg.bind_addr, "0.0.0.0:9000");
        assert_eq!(cfg.reconnect_grace_secs, 5);
        assert_eq!(cfg.game_type, "SOLO");
        assert_eq!(cfg.session_config().reconnect_grace_secs, 5);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let path = std::env::temp_dir().join("unotable-does-not-exist.toml");
        assert!(ServerConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_load_from_rejects_wrong_type() {
        let path = write_temp("badtype", "sweep_interval_ms = \"soon\"\n");
        let result = ServerConfig::load_from(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }

    #[test]
    fn test_sweep_interval_never_zero() {
        let cfg = ServerConfig {
            sweep_interval_ms: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.sweep_interval(), Duration::from_millis(1));
    }
}
