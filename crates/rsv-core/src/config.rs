//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数
//! 2. rsv-gateway.toml 設定ファイル
//! 3. デフォルト値
//!
//! 設定ファイル内では `${VAR_NAME}` 形式で環境変数を展開できます。

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::booking::ReservationStatus;
use crate::Error;

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "rsv-gateway.toml";

/// Where availability information comes from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityBackend {
    /// The local SQLite booking store
    #[default]
    Local,
    /// A remote booking backend over HTTP
    Http,
}

/// Main configuration for rsv-gateway
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub commit: CommitConfig,

    #[serde(default)]
    pub availability: AvailabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Port for HTTP API server
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Throttling of availability checks during a preview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Checks in flight at once
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Pause between two windows
    #[serde(default = "default_window_pause_ms")]
    pub window_pause_ms: u64,

    /// Timeout for a single availability check
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,

    /// Age after which a preview can no longer be committed
    #[serde(default = "default_preview_ttl_secs")]
    pub preview_ttl_secs: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            window_pause_ms: default_window_pause_ms(),
            check_timeout_ms: default_check_timeout_ms(),
            preview_ttl_secs: default_preview_ttl_secs(),
        }
    }
}

impl PreviewConfig {
    pub fn window_pause(&self) -> Duration {
        Duration::from_millis(self.window_pause_ms)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }

    pub fn preview_ttl(&self) -> Duration {
        Duration::from_secs(self.preview_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommitConfig {
    /// Re-check availability of every occurrence right before inserting it
    #[serde(default)]
    pub recheck_availability: bool,

    /// Status given to reservations created from a series
    #[serde(default)]
    pub initial_status: ReservationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AvailabilityConfig {
    #[serde(default)]
    pub backend: AvailabilityBackend,

    /// Base URL of the booking backend (http backend only)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token sent to the booking backend
    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_api_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "data/rsv-gateway.db".to_string()
}

fn default_window_size() -> usize {
    7
}

fn default_window_pause_ms() -> u64 {
    200
}

fn default_check_timeout_ms() -> u64 {
    5000
}

fn default_preview_ttl_secs() -> u64 {
    900
}

impl Config {
    /// 設定ファイルから環境変数を展開する
    ///
    /// `${VAR_NAME}` 形式の文字列を環境変数の値に置換します。
    /// 環境変数が存在しない場合は空文字列になります。
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // '{' を消費

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// TOML 文字列から設定を読み込む（環境変数の上書きなし）
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let expanded = Self::expand_env_vars(content);
        let config: Config = toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 設定ファイルから設定を読み込む
    ///
    /// 設定ファイル内の `${VAR_NAME}` は環境変数の値に置換され、
    /// その後、環境変数で上書きされます（環境変数が優先）。
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let expanded = Self::expand_env_vars(&content);
        let mut config: Config = toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// デフォルトパスから設定を読み込む
    ///
    /// `./rsv-gateway.toml` が存在すればそれを使い、なければ環境変数のみ。
    pub fn load() -> crate::Result<Self> {
        if Path::new(CONFIG_FILE).exists() {
            return Self::from_toml_file(CONFIG_FILE);
        }
        Self::from_env()
    }

    /// 環境変数とデフォルト値から設定を読み込む
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 環境変数で設定を上書きする
    fn apply_env_overrides(&mut self) -> crate::Result<()> {
        if let Some(port) = env_parse("API_PORT")? {
            self.api.port = port;
        }
        if let Ok(path) = std::env::var("DB_PATH") {
            if !path.is_empty() {
                self.database.db_path = path;
            }
        }

        if let Some(size) = env_parse("PREVIEW_WINDOW_SIZE")? {
            self.preview.window_size = size;
        }
        if let Some(pause) = env_parse("PREVIEW_WINDOW_PAUSE_MS")? {
            self.preview.window_pause_ms = pause;
        }
        if let Some(timeout) = env_parse("AVAILABILITY_TIMEOUT_MS")? {
            self.preview.check_timeout_ms = timeout;
        }
        if let Some(ttl) = env_parse("PREVIEW_TTL_SECS")? {
            self.preview.preview_ttl_secs = ttl;
        }

        if let Ok(recheck) = std::env::var("COMMIT_RECHECK_AVAILABILITY") {
            self.commit.recheck_availability = recheck.to_lowercase() == "true";
        }

        if let Ok(backend) = std::env::var("AVAILABILITY_BACKEND") {
            self.availability.backend = match backend.to_lowercase().as_str() {
                "http" | "remote" => AvailabilityBackend::Http,
                "local" | "sqlite" | "" => AvailabilityBackend::Local,
                other => return Err(Error::Config(format!("Unknown AVAILABILITY_BACKEND '{}'", other))),
            };
        }
        if let Ok(url) = std::env::var("AVAILABILITY_BASE_URL") {
            if !url.is_empty() {
                self.availability.base_url = Some(url);
            }
        }
        if let Ok(token) = std::env::var("AVAILABILITY_API_TOKEN") {
            if !token.is_empty() {
                self.availability.api_token = Some(token);
            }
        }

        Ok(())
    }

    /// 値の整合性を確認する
    pub fn validate(&self) -> crate::Result<()> {
        if self.preview.window_size == 0 {
            return Err(Error::Config("preview.window_size must be at least 1".to_string()));
        }
        if self.preview.check_timeout_ms == 0 {
            return Err(Error::Config("preview.check_timeout_ms must be positive".to_string()));
        }
        if self.availability.backend == AvailabilityBackend::Http && self.availability.base_url.is_none() {
            return Err(Error::Config(
                "availability.base_url is required for the http backend".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> crate::Result<Option<T>> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("Invalid value for {}: '{}'", name, value))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.port, 3000);
        assert_eq!(config.preview.window_size, 7);
        assert_eq!(config.preview.check_timeout(), Duration::from_secs(5));
        assert!(!config.commit.recheck_availability);
        assert_eq!(config.commit.initial_status, ReservationStatus::Pending);
        assert_eq!(config.availability.backend, AvailabilityBackend::Local);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[api]
port = 8080

[preview]
window_size = 3
window_pause_ms = 0

[commit]
recheck_availability = true
initial_status = "approved"
"#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.preview.window_size, 3);
        assert_eq!(config.preview.window_pause(), Duration::ZERO);
        // untouched keys keep their defaults
        assert_eq!(config.preview.check_timeout_ms, 5000);
        assert!(config.commit.recheck_availability);
        assert_eq!(config.commit.initial_status, ReservationStatus::Approved);
        assert_eq!(config.database.db_path, "data/rsv-gateway.db");
    }

    #[test]
    fn test_expand_env_vars() {
        // PATH is always present in the test environment
        let path = std::env::var("PATH").unwrap_or_default();
        assert_eq!(Config::expand_env_vars("x=${PATH}"), format!("x={}", path));
        assert_eq!(Config::expand_env_vars("${RSV_TEST_SURELY_UNSET_VAR}"), "");
        assert_eq!(Config::expand_env_vars("plain $ text"), "plain $ text");
    }

    #[test]
    fn test_rejects_zero_window() {
        let err = Config::from_toml_str("[preview]\nwindow_size = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_http_backend_requires_url() {
        let err = Config::from_toml_str("[availability]\nbackend = \"http\"\n").unwrap_err();
        assert!(err.to_string().contains("base_url"));

        let ok = Config::from_toml_str(
            "[availability]\nbackend = \"http\"\nbase_url = \"http://localhost:8081/api\"\n",
        )
        .unwrap();
        assert_eq!(ok.availability.backend, AvailabilityBackend::Http);
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[database]\ndb_path = \"/tmp/rsv-test.db\"\n").unwrap();
        let config = Config::from_toml_file(&path).unwrap();
        // DB_PATH may override in CI; either way it is non-empty
        assert!(!config.database.db_path.is_empty());
    }
}
