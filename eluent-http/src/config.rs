use std::path::{Path, PathBuf};
use std::time::Duration;

use eluent_core::SearchSettings;
use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable holding the catalog API base URL.
pub const BASE_URL_ENV: &str = "ELUENT_API_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Contents of `~/.config/eluent/config.toml`.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub search: SearchSettings,
}

/// Resolved transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Base URL without trailing slash.
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl HttpConfig {
    /// Resolves the base URL from `env` first, then the config file, then the
    /// default. Blank candidates are skipped.
    pub fn resolve(env: Option<&str>, file: &ConfigFile) -> Result<Self, ConfigError> {
        let candidate = [env, file.base_url.as_deref()]
            .into_iter()
            .flatten()
            .find(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_URL);

        Ok(Self {
            base_url: normalize_base_url(candidate)?,
            timeout: file
                .timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    /// Resolves against the process environment and the user config file.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var(BASE_URL_ENV).ok();
        Self::resolve(env.as_deref(), &load_config())
    }
}

fn normalize_base_url(candidate: &str) -> Result<String, ConfigError> {
    let trimmed = candidate.trim().trim_end_matches('/');
    reqwest::Url::parse(trimmed).map_err(|e| ConfigError::InvalidBaseUrl {
        url: candidate.to_string(),
        reason: e.to_string(),
    })?;
    Ok(trimmed.to_string())
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("eluent").join("config.toml"))
}

/// Reads a config file. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ConfigFile::default()),
        Err(e) => return Err(e.into()),
    };
    Ok(toml::from_str(&content)?)
}

/// Reads the user config file, falling back to defaults when it is absent or
/// unreadable.
pub fn load_config() -> ConfigFile {
    let Some(path) = config_path() else {
        return ConfigFile::default();
    };

    match load_config_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring config file");
            ConfigFile::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(base_url: Option<&str>) -> ConfigFile {
        ConfigFile {
            base_url: base_url.map(String::from),
            ..ConfigFile::default()
        }
    }

    #[test]
    fn env_wins_over_file() {
        let config = HttpConfig::resolve(Some("https://env.example/api"), &file(Some("https://file.example"))).unwrap();
        assert_eq!(config.base_url, "https://env.example/api");
    }

    #[test]
    fn blank_env_falls_through_to_file() {
        let config = HttpConfig::resolve(Some("   "), &file(Some("https://file.example/v1/"))).unwrap();
        assert_eq!(config.base_url, "https://file.example/v1");
    }

    #[test]
    fn default_when_nothing_set() {
        let config = HttpConfig::resolve(None, &ConfigFile::default()).unwrap();
        assert_eq!(config, HttpConfig::default());
    }

    #[test]
    fn trailing_slashes_trimmed() {
        let config = HttpConfig::resolve(Some("http://localhost:3000///"), &ConfigFile::default()).unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
    }

    #[test]
    fn zero_timeout_uses_default() {
        let file = ConfigFile {
            timeout_ms: Some(0),
            ..ConfigFile::default()
        };
        let config = HttpConfig::resolve(None, &file).unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn relative_url_rejected() {
        let err = HttpConfig::resolve(Some("/api"), &ConfigFile::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn parses_config_file() {
        let path = std::env::temp_dir().join(format!("eluent-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
base_url = "https://catalog.example/api"
timeout_ms = 2500

[search]
debounce_ms = 250
page_size = 24
category = "laptops"
"#,
        )
        .unwrap();

        let loaded = load_config_from(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let http = HttpConfig::resolve(None, &loaded).unwrap();
        assert_eq!(http.base_url, "https://catalog.example/api");
        assert_eq!(http.timeout, Duration::from_millis(2500));

        let search = loaded.search.into_config();
        assert_eq!(search.debounce, Duration::from_millis(250));
        assert_eq!(search.page_size, 24);
        assert_eq!(search.category.as_deref(), Some("laptops"));
    }

    #[test]
    fn missing_file_is_default() {
        let loaded = load_config_from(Path::new("/nonexistent/eluent/config.toml")).unwrap();
        assert!(loaded.base_url.is_none());
        assert!(loaded.search.page_size.is_none());
    }

    #[test]
    fn malformed_file_is_error() {
        let path = std::env::temp_dir().join(format!("eluent-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "base_url = [").unwrap();
        let result = load_config_from(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
