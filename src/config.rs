//! Configuration file parser for ~/.config/gridfeed/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
//! Provider credentials can also come from the environment, which takes
//! precedence over the file.
use crate::provider::{klipy, tenor, HttpSettings};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tenor: TenorConfig,
    pub klipy: KlipyConfig,
    pub http: HttpConfig,
}

/// `[tenor]` section.
///
/// Custom Debug impl masks `api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TenorConfig {
    /// Without a key the Tenor feed stays empty.
    pub api_key: Option<String>,
    /// Integration identifier sent as `client_key`; omitted when empty.
    pub client_key: String,
    pub country: String,
    pub locale: String,
    /// Results per page.
    pub limit: u32,
    pub base_url: String,
}

impl Default for TenorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            client_key: String::new(),
            country: "US".to_string(),
            locale: "en_US".to_string(),
            limit: 30,
            base_url: tenor::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for TenorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenorConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("client_key", &self.client_key)
            .field("country", &self.country)
            .field("locale", &self.locale)
            .field("limit", &self.limit)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// `[klipy]` section.
///
/// Custom Debug impl masks `api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct KlipyConfig {
    /// Without a key the Klipy feed stays empty.
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for KlipyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: klipy::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for KlipyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KlipyConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// `[http]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_response_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let defaults = HttpSettings::default();
        Self {
            timeout_secs: defaults.timeout.as_secs(),
            max_retries: defaults.max_retries,
            retry_backoff_ms: defaults.retry_backoff.as_millis() as u64,
            max_response_bytes: defaults.max_response_bytes,
        }
    }
}

impl HttpConfig {
    pub fn settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            max_response_bytes: self.max_response_bytes,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            tenor_key = config.tenor.api_key.is_some(),
            klipy_key = config.klipy.api_key.is_some(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Applies overrides from process environment variables.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    ///
    /// Empty values are ignored so an exported-but-blank variable does not
    /// wipe a key from the file.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = get("TENOR_API_KEY") {
            self.tenor.api_key = Some(key);
        }
        if let Some(client_key) = get("TENOR_CLIENT_KEY") {
            self.tenor.client_key = client_key;
        }
        if let Some(country) = get("TENOR_COUNTRY") {
            self.tenor.country = country;
        }
        if let Some(locale) = get("TENOR_LOCALE") {
            self.tenor.locale = locale;
        }
        if let Some(limit) = get("TENOR_LIMIT") {
            match limit.trim().parse::<u32>() {
                Ok(limit) if limit > 0 => self.tenor.limit = limit,
                _ => tracing::warn!(value = %limit, "Ignoring invalid TENOR_LIMIT"),
            }
        }
        if let Some(key) = get("KLIPY_API_KEY") {
            self.klipy.api_key = Some(key);
        }
        if let Some(base_url) = get("KLIPY_BASE_URL") {
            self.klipy.base_url = base_url;
        }
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    const SECTIONS: [(&str, &[&str]); 3] = [
        (
            "tenor",
            &["api_key", "client_key", "country", "locale", "limit", "base_url"],
        ),
        ("klipy", &["api_key", "base_url"]),
        (
            "http",
            &["timeout_secs", "max_retries", "retry_backoff_ms", "max_response_bytes"],
        ),
    ];

    for (key, value) in raw {
        let Some((_, known)) = SECTIONS.iter().find(|(name, _)| name == key) else {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            continue;
        };
        if let Some(table) = value.as_table() {
            for nested in table.keys() {
                if !known.contains(&nested.as_str()) {
                    tracing::warn!(section = %key, key = %nested, "Unknown key in config file, ignoring");
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn write_config(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("gridfeed_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.tenor.api_key.is_none());
        assert_eq!(config.tenor.country, "US");
        assert_eq!(config.tenor.locale, "en_US");
        assert_eq!(config.tenor.limit, 30);
        assert_eq!(config.tenor.base_url, tenor::DEFAULT_BASE_URL);
        assert!(config.klipy.api_key.is_none());
        assert_eq!(config.klipy.base_url, klipy::DEFAULT_BASE_URL);
        assert_eq!(config.http.timeout_secs, 20);
        assert_eq!(config.http.max_retries, 2);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/gridfeed_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.tenor.limit, 30);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let path = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.tenor.country, "US");
        cleanup(&path);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let path = write_config("partial", "[tenor]\nlocale = \"de_DE\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.tenor.locale, "de_DE");
        assert_eq!(config.tenor.country, "US");
        assert_eq!(config.http.retry_backoff_ms, 500);
        cleanup(&path);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
[tenor]
api_key = "tenor-secret"
client_key = "gridfeed"
country = "GB"
locale = "en_GB"
limit = 24
base_url = "https://tenor.example.com/v2"

[klipy]
api_key = "klipy-secret"
base_url = "https://klipy.example.com/api/v1"

[http]
timeout_secs = 5
max_retries = 0
retry_backoff_ms = 100
max_response_bytes = 1024
"#;
        let path = write_config("full", content);
        let config = Config::load(&path).unwrap();

        assert_eq!(config.tenor.api_key.as_deref(), Some("tenor-secret"));
        assert_eq!(config.tenor.client_key, "gridfeed");
        assert_eq!(config.tenor.country, "GB");
        assert_eq!(config.tenor.limit, 24);
        assert_eq!(config.klipy.api_key.as_deref(), Some("klipy-secret"));
        assert_eq!(config.klipy.base_url, "https://klipy.example.com/api/v1");

        let settings = config.http.settings();
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert_eq!(settings.max_retries, 0);
        assert_eq!(settings.retry_backoff, Duration::from_millis(100));
        assert_eq!(settings.max_response_bytes, 1024);

        cleanup(&path);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let path = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        cleanup(&path);
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let path = write_config(
            "unknown",
            "mystery = 1\n[tenor]\nlimit = 10\ncolour = \"red\"\n",
        );
        let config = Config::load(&path).unwrap();
        assert_eq!(config.tenor.limit, 10);
        cleanup(&path);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let path = write_config("wrongtype", "[tenor]\nlimit = \"many\"\n");
        assert!(Config::load(&path).is_err());
        cleanup(&path);
    }

    #[test]
    fn test_too_large_file_rejected() {
        let path = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        cleanup(&path);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TENOR_API_KEY", "env-tenor"),
            ("TENOR_LIMIT", "12"),
            ("TENOR_LOCALE", "fr_FR"),
            ("KLIPY_API_KEY", "env-klipy"),
            ("KLIPY_BASE_URL", "https://klipy.test/api/v1"),
        ]);
        let mut config = Config::default();
        config.tenor.api_key = Some("file-tenor".to_string());

        config.apply_env_from(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.tenor.api_key.as_deref(), Some("env-tenor"));
        assert_eq!(config.tenor.limit, 12);
        assert_eq!(config.tenor.locale, "fr_FR");
        assert_eq!(config.tenor.country, "US");
        assert_eq!(config.klipy.api_key.as_deref(), Some("env-klipy"));
        assert_eq!(config.klipy.base_url, "https://klipy.test/api/v1");
    }

    #[test]
    fn test_env_blank_and_invalid_values_ignored() {
        let env: HashMap<&str, &str> =
            HashMap::from([("TENOR_API_KEY", "  "), ("TENOR_LIMIT", "lots")]);
        let mut config = Config::default();
        config.tenor.api_key = Some("file-tenor".to_string());

        config.apply_env_from(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.tenor.api_key.as_deref(), Some("file-tenor"));
        assert_eq!(config.tenor.limit, 30);
    }

    #[test]
    fn test_debug_masks_api_keys() {
        let mut config = Config::default();
        config.tenor.api_key = Some("super-secret-tenor".to_string());
        config.klipy.api_key = Some("super-secret-klipy".to_string());

        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-tenor"));
        assert!(!debug_output.contains("super-secret-klipy"));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_debug_shows_none_when_no_api_key() {
        let debug_output = format!("{:?}", Config::default());
        assert!(debug_output.contains("None"));
        assert!(!debug_output.contains("[REDACTED]"));
    }
}
