//! Configuration management for logup
//!
//! Settings are layered, lowest precedence first: built-in defaults, a TOML
//! file (`--config`, or `logup.toml` in the working directory), `LOGUP_*`
//! environment variables, then command-line flags. Validation runs once,
//! after every layer is applied.

use crate::api::{HttpMethod, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::discovery::DEFAULT_EXTENSIONS;
use crate::error::{CliError, Result};
use crate::upload::backoff::{
    DEFAULT_BASE_DELAY, DEFAULT_JITTER_RATIO, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY,
};
use crate::upload::job::DEFAULT_CHUNK_SIZE;
use crate::upload::{RetryPolicy, DEFAULT_CONCURRENCY};
use logup_common::types::parse_byte_size;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use url::Url;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Config file picked up from the working directory when `--config` is absent
pub const CONFIG_FILE_NAME: &str = "logup.toml";

pub const ENV_ENDPOINT: &str = "LOGUP_ENDPOINT";
pub const ENV_CHUNK_SIZE: &str = "LOGUP_CHUNK_SIZE";
pub const ENV_MAX_ATTEMPTS: &str = "LOGUP_MAX_ATTEMPTS";
pub const ENV_BASE_DELAY_SECS: &str = "LOGUP_BASE_DELAY_SECS";
pub const ENV_MAX_DELAY_SECS: &str = "LOGUP_MAX_DELAY_SECS";
pub const ENV_CONCURRENCY: &str = "LOGUP_CONCURRENCY";
pub const ENV_TIMEOUT_SECS: &str = "LOGUP_TIMEOUT_SECS";

/// Raw, unvalidated upload configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Collection endpoint URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Chunk size in bytes; the file may also use units such as `"4MiB"`
    #[serde(deserialize_with = "deserialize_byte_size")]
    pub chunk_size: u64,

    /// Attempts per chunk, including the first
    pub max_attempts: u32,

    pub base_delay_secs: f64,

    pub max_delay_secs: f64,

    /// Concurrent chunk workers per file
    pub concurrency: usize,

    /// Per-request timeout
    pub timeout_secs: f64,

    /// Jitter as a fraction of each backoff delay, in `[0, 1]`
    pub jitter: f64,

    pub method: HttpMethod,

    /// Extensions picked up when a directory is given
    pub extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_secs: DEFAULT_BASE_DELAY.as_secs_f64(),
            max_delay_secs: DEFAULT_MAX_DELAY.as_secs_f64(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS as f64,
            jitter: DEFAULT_JITTER_RATIO,
            method: HttpMethod::default(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Values given on the command line; `None` leaves the lower layer in place
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub chunk_size: Option<u64>,
    pub max_attempts: Option<u32>,
    pub base_delay_secs: Option<f64>,
    pub max_delay_secs: Option<f64>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<f64>,
    pub jitter: Option<f64>,
    pub method: Option<HttpMethod>,
}

/// Validated settings ready to drive an upload
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub endpoint: Url,
    pub chunk_size: NonZeroU64,
    pub policy: RetryPolicy,
    pub concurrency: usize,
    pub timeout: Duration,
    pub method: HttpMethod,
    pub extensions: Vec<String>,
}

impl UploadConfig {
    /// Defaults merged with a config file.
    ///
    /// An explicit path must exist; the working-directory `logup.toml` is
    /// optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default = PathBuf::from(CONFIG_FILE_NAME);
                default.is_file().then_some(default)
            }
        };

        match path {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a TOML config file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                CliError::config(format!("config file '{}' not found", path.display()))
            }
            _ => CliError::Io(e),
        })?;

        let config: Self = toml::from_str(&content)?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Overlay `LOGUP_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(endpoint) = env_value::<String>(ENV_ENDPOINT)? {
            self.endpoint = Some(endpoint);
        }
        if let Ok(size) = std::env::var(ENV_CHUNK_SIZE) {
            self.chunk_size = parse_byte_size(&size)?;
        }
        if let Some(attempts) = env_value(ENV_MAX_ATTEMPTS)? {
            self.max_attempts = attempts;
        }
        if let Some(secs) = env_value(ENV_BASE_DELAY_SECS)? {
            self.base_delay_secs = secs;
        }
        if let Some(secs) = env_value(ENV_MAX_DELAY_SECS)? {
            self.max_delay_secs = secs;
        }
        if let Some(concurrency) = env_value(ENV_CONCURRENCY)? {
            self.concurrency = concurrency;
        }
        if let Some(secs) = env_value(ENV_TIMEOUT_SECS)? {
            self.timeout_secs = secs;
        }
        Ok(())
    }

    /// Overlay command-line flags
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(endpoint) = &overrides.endpoint {
            self.endpoint = Some(endpoint.clone());
        }
        if let Some(chunk_size) = overrides.chunk_size {
            self.chunk_size = chunk_size;
        }
        if let Some(max_attempts) = overrides.max_attempts {
            self.max_attempts = max_attempts;
        }
        if let Some(secs) = overrides.base_delay_secs {
            self.base_delay_secs = secs;
        }
        if let Some(secs) = overrides.max_delay_secs {
            self.max_delay_secs = secs;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeout_secs = secs;
        }
        if let Some(jitter) = overrides.jitter {
            self.jitter = jitter;
        }
        if let Some(method) = overrides.method {
            self.method = method;
        }
    }

    /// Check every value and build the settings the uploader runs with
    pub fn validate(&self) -> Result<UploadSettings> {
        let raw_endpoint = self.endpoint.as_deref().ok_or_else(|| {
            CliError::config(format!("no endpoint configured; pass --endpoint or set {ENV_ENDPOINT}"))
        })?;
        let endpoint = Url::parse(raw_endpoint)
            .map_err(|e| CliError::config(format!("invalid endpoint '{raw_endpoint}': {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(CliError::config(format!(
                "endpoint must use http or https, got '{}'",
                endpoint.scheme()
            )));
        }

        let chunk_size = NonZeroU64::new(self.chunk_size)
            .ok_or_else(|| CliError::config("chunk_size must be greater than zero"))?;

        let base_delay = seconds("base_delay", self.base_delay_secs)?;
        let max_delay = seconds("max_delay", self.max_delay_secs)?;
        let policy = RetryPolicy::new(self.max_attempts, base_delay, max_delay)?
            .with_jitter(self.jitter)?;

        if self.concurrency == 0 {
            return Err(CliError::config("concurrency must be at least 1"));
        }

        let timeout = seconds("timeout", self.timeout_secs)?;
        if timeout.is_zero() {
            return Err(CliError::config("timeout must be greater than zero"));
        }

        Ok(UploadSettings {
            endpoint,
            chunk_size,
            policy,
            concurrency: self.concurrency,
            timeout,
            method: self.method,
            extensions: self.extensions.clone(),
        })
    }

    /// Render as TOML, the same format the config file uses
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        CliError::config(format!("{name} must be a non-negative number of seconds, got {value}"))
    })
}

fn env_value<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CliError::config(format!("invalid {name}='{raw}': {e}"))),
        Err(_) => Ok(None),
    }
}

/// Accept either a byte count or a human-readable size string
fn deserialize_byte_size<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ByteSizeValue {
        Bytes(u64),
        Text(String),
    }

    match ByteSizeValue::deserialize(deserializer)? {
        ByteSizeValue::Bytes(bytes) => Ok(bytes),
        ByteSizeValue::Text(text) => parse_byte_size(&text).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const ALL_ENV: &[&str] = &[
        ENV_ENDPOINT,
        ENV_CHUNK_SIZE,
        ENV_MAX_ATTEMPTS,
        ENV_BASE_DELAY_SECS,
        ENV_MAX_DELAY_SECS,
        ENV_CONCURRENCY,
        ENV_TIMEOUT_SECS,
    ];

    fn clear_env() {
        for name in ALL_ENV {
            std::env::remove_var(name);
        }
    }

    fn with_endpoint() -> UploadConfig {
        UploadConfig {
            endpoint: Some("http://localhost:8080/upload".into()),
            ..UploadConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = UploadConfig::default();
        assert_eq!(config.chunk_size, 1024 * 1024);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_secs, 1.0);
        assert_eq!(config.max_delay_secs, 30.0);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.timeout_secs, 30.0);
        assert_eq!(config.method, HttpMethod::Post);
        assert_eq!(config.extensions, vec!["log", "txt"]);
    }

    #[test]
    fn test_validate_defaults_with_endpoint() {
        let settings = with_endpoint().validate().unwrap();
        assert_eq!(settings.chunk_size.get(), 1024 * 1024);
        assert_eq!(settings.policy.max_attempts(), 3);
        assert_eq!(settings.policy.base_delay(), Duration::from_secs(1));
        assert_eq!(settings.policy.max_delay(), Duration::from_secs(30));
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(UploadConfig::default().validate().is_err());

        let cases: Vec<Box<dyn Fn(&mut UploadConfig)>> = vec![
            Box::new(|c| c.endpoint = Some("not a url".into())),
            Box::new(|c| c.endpoint = Some("ftp://example.com/upload".into())),
            Box::new(|c| c.chunk_size = 0),
            Box::new(|c| c.max_attempts = 0),
            Box::new(|c| c.base_delay_secs = 0.0),
            Box::new(|c| c.base_delay_secs = -1.0),
            Box::new(|c| c.max_delay_secs = 0.5),
            Box::new(|c| c.concurrency = 0),
            Box::new(|c| c.timeout_secs = 0.0),
            Box::new(|c| c.jitter = 1.5),
            Box::new(|c| c.max_delay_secs = f64::NAN),
        ];

        for (i, mutate) in cases.iter().enumerate() {
            let mut config = with_endpoint();
            mutate(&mut config);
            let err = config.validate().unwrap_err();
            assert_eq!(err.exit_code(), crate::error::EXIT_USAGE, "case {i}: {err}");
        }
    }

    #[test]
    fn test_toml_file_with_units() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logup.toml");
        fs::write(
            &path,
            r#"
endpoint = "https://logs.example.com/ingest"
chunk_size = "4MiB"
max_attempts = 5
method = "put"
extensions = ["log"]
"#,
        )
        .unwrap();

        let config = UploadConfig::load(Some(&path)).unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("https://logs.example.com/ingest"));
        assert_eq!(config.chunk_size, 4 * 1024 * 1024);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.method, HttpMethod::Put);
        assert_eq!(config.extensions, vec!["log"]);
        // Unset keys keep defaults
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_toml_rejects_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logup.toml");
        fs::write(&path, "retries = 3\n").unwrap();

        let err = UploadConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, CliError::TomlParse(_)));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = UploadConfig::load(Some(Path::new("/no/such/logup.toml"))).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file_values() {
        clear_env();
        std::env::set_var(ENV_ENDPOINT, "http://env.example.com/upload");
        std::env::set_var(ENV_CHUNK_SIZE, "512KiB");
        std::env::set_var(ENV_MAX_ATTEMPTS, "7");
        std::env::set_var(ENV_BASE_DELAY_SECS, "0.5");
        std::env::set_var(ENV_CONCURRENCY, "2");

        let mut config = with_endpoint();
        config.apply_env().unwrap();
        clear_env();

        assert_eq!(config.endpoint.as_deref(), Some("http://env.example.com/upload"));
        assert_eq!(config.chunk_size, 512 * 1024);
        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.base_delay_secs, 0.5);
        assert_eq!(config.concurrency, 2);
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_config_error() {
        clear_env();
        std::env::set_var(ENV_MAX_ATTEMPTS, "lots");

        let mut config = UploadConfig::default();
        let err = config.apply_env().unwrap_err();
        clear_env();

        assert!(err.to_string().contains(ENV_MAX_ATTEMPTS));
        assert_eq!(err.exit_code(), crate::error::EXIT_USAGE);
    }

    #[test]
    fn test_flags_override_everything() {
        let mut config = with_endpoint();
        config.apply_overrides(&ConfigOverrides {
            endpoint: Some("https://flag.example.com/".into()),
            max_attempts: Some(9),
            jitter: Some(0.0),
            ..ConfigOverrides::default()
        });

        assert_eq!(config.endpoint.as_deref(), Some("https://flag.example.com/"));
        assert_eq!(config.max_attempts, 9);
        assert_eq!(config.jitter, 0.0);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_render_toml_round_trips() {
        let config = with_endpoint();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("endpoint = \"http://localhost:8080/upload\""));
        let parsed: UploadConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
