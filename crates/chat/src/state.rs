use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

pub const APP_NAME: &str = "tunnel";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_BROKER_URL: &str = "https://lluck.hackclub.app/";

/// Longest display name the chat accepts
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the tunnel broker
    #[serde(default = "default_broker_url")]
    pub broker_url: Url,
    /// Name shown to other participants, asked for on join if unset
    #[serde(default)]
    pub display_name: Option<String>,
    /// One of trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for daily rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// How long init may wait for the own key to be ready
    #[serde(default = "default_key_ready_timeout_secs")]
    pub key_ready_timeout_secs: u64,
}

fn default_broker_url() -> Url {
    Url::parse(DEFAULT_BROKER_URL).expect("hardcoded URL must parse")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_key_ready_timeout_secs() -> u64 {
    10
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            broker_url: default_broker_url(),
            display_name: None,
            log_level: default_log_level(),
            log_dir: None,
            key_ready_timeout_secs: default_key_ready_timeout_secs(),
        }
    }
}

impl ChatConfig {
    pub fn log_level(&self) -> Result<tracing::Level, StateError> {
        tracing::Level::from_str(&self.log_level)
            .map_err(|_| StateError::InvalidLogLevel(self.log_level.clone()))
    }

    pub fn key_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.key_ready_timeout_secs)
    }
}

/// Check a display name before it goes on the wire
pub fn validate_display_name(name: &str) -> Result<String, StateError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(StateError::InvalidDisplayName(name.to_string()));
    }
    Ok(name.to_string())
}

#[derive(Debug, Clone)]
pub struct ChatState {
    /// Path to the tunnel directory (~/.tunnel)
    pub tunnel_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: ChatConfig,
}

impl ChatState {
    /// Get the tunnel directory path (custom or default ~/.tunnel)
    pub fn tunnel_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new tunnel directory with a config file
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<ChatConfig>,
    ) -> Result<Self, StateError> {
        let tunnel_dir = Self::tunnel_dir(custom_path)?;
        let config_path = tunnel_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            return Err(StateError::AlreadyInitialized);
        }
        fs::create_dir_all(&tunnel_dir)?;

        let config = config.unwrap_or_default();
        if let Some(name) = &config.display_name {
            validate_display_name(name)?;
        }
        config.log_level()?;
        fs::write(&config_path, toml::to_string_pretty(&config)?)?;

        Ok(Self {
            tunnel_dir,
            config_path,
            config,
        })
    }

    /// Load existing state from the tunnel directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let tunnel_dir = Self::tunnel_dir(custom_path)?;
        let config_path = tunnel_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Err(StateError::NotInitialized);
        }

        let config: ChatConfig = toml::from_str(&fs::read_to_string(&config_path)?)?;

        Ok(Self {
            tunnel_dir,
            config_path,
            config,
        })
    }

    /// Load state if initialized, otherwise fall back to defaults
    pub fn load_or_default(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        match Self::load(custom_path.clone()) {
            Err(StateError::NotInitialized) => {
                let tunnel_dir = Self::tunnel_dir(custom_path)?;
                Ok(Self {
                    config_path: tunnel_dir.join(CONFIG_FILE_NAME),
                    tunnel_dir,
                    config: ChatConfig::default(),
                })
            }
            other => other,
        }
    }
}

/// Resolve the broker URL
///
/// Priority: explicit `--remote` flag > config file `broker_url` > the public relay.
pub fn resolve_remote(explicit: Option<Url>, config: &ChatConfig) -> Url {
    explicit.unwrap_or_else(|| config.broker_url.clone())
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("tunnel directory not initialized. Run 'tunnel init' first")]
    NotInitialized,

    #[error("tunnel directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("display name must be 1 to {} characters, got '{0}'", MAX_DISPLAY_NAME_LEN)]
    InvalidDisplayName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_broker_url_parses() {
        assert_eq!(
            ChatConfig::default().broker_url.as_str(),
            DEFAULT_BROKER_URL
        );
    }

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tunnel");

        let config = ChatConfig {
            display_name: Some("alice".to_string()),
            log_level: "debug".to_string(),
            ..Default::default()
        };
        let state = ChatState::init(Some(path.clone()), Some(config.clone())).unwrap();
        assert!(state.config_path.exists());

        let loaded = ChatState::load(Some(path.clone())).unwrap();
        assert_eq!(loaded.config, config);
        assert_eq!(loaded.config.log_level().unwrap(), tracing::Level::DEBUG);

        assert!(matches!(
            ChatState::init(Some(path), None),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_missing_and_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ChatState::load(Some(dir.path().to_path_buf())),
            Err(StateError::NotInitialized)
        ));
        let state = ChatState::load_or_default(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(state.config, ChatConfig::default());

        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "display_name = \"bob\"\n",
        )
        .unwrap();
        let state = ChatState::load(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(state.config.display_name.as_deref(), Some("bob"));
        assert_eq!(state.config.key_ready_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChatConfig {
            log_level: "loud".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            ChatState::init(Some(dir.path().to_path_buf()), Some(config)),
            Err(StateError::InvalidLogLevel(_))
        ));

        assert!(validate_display_name("  ").is_err());
        assert!(validate_display_name(&"x".repeat(MAX_DISPLAY_NAME_LEN + 1)).is_err());
        assert_eq!(validate_display_name(" alice ").unwrap(), "alice");
    }

    #[test]
    fn test_resolve_remote_explicit_wins() {
        let explicit = Url::parse("http://example.com:9999").unwrap();
        let config = ChatConfig::default();
        assert_eq!(resolve_remote(Some(explicit.clone()), &config), explicit);
        assert_eq!(resolve_remote(None, &config).as_str(), DEFAULT_BROKER_URL);
    }
}
