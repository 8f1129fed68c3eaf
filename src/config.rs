//! Configuration loader and validator for the fact-checker bot.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub telegram: Telegram,
    pub database: Database,
    #[serde(default)]
    pub redis: Redis,
    #[serde(default)]
    pub factcheck: FactCheck,
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub validation: Validation,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub poll_interval_ms: u64,
    pub max_backoff_seconds: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    #[serde(default = "default_health_addr")]
    pub health_addr: String,
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Telegram {
    pub bot_token: String,
    #[serde(default)]
    pub admin_user_ids: Vec<i64>,
    #[serde(default = "default_bot_username")]
    pub bot_username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Database {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Redis is optional; an empty url keeps the cache in memory only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Redis {
    #[serde(default)]
    pub url: String,
}

/// External fact-check lookup (Google Fact Check Tools).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FactCheck {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_factcheck_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_language")]
    pub default_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cache {
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Validation {
    #[serde(default = "default_min_claim_length")]
    pub min_claim_length: usize,
    #[serde(default = "default_max_claim_length")]
    pub max_claim_length: usize,
    #[serde(default = "default_prohibited_patterns")]
    pub prohibited_patterns: Vec<String>,
}

fn default_max_attempts() -> i32 {
    5
}
fn default_health_addr() -> String {
    "0.0.0.0:8000".into()
}
fn default_bot_username() -> String {
    "factchecker_bot".into()
}
fn default_max_connections() -> u32 {
    20
}
fn default_factcheck_base_url() -> String {
    "https://factchecktools.googleapis.com/v1alpha1/claims:search".into()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_language() -> String {
    "fa".into()
}
fn default_cache_ttl() -> u64 {
    3600
}
fn default_memory_capacity() -> usize {
    1000
}
fn default_namespace() -> String {
    "factchecker".into()
}
fn default_min_claim_length() -> usize {
    10
}
fn default_max_claim_length() -> usize {
    1000
}
fn default_prohibited_patterns() -> Vec<String> {
    vec![
        r"private\s+information".into(),
        r"classified\s+data".into(),
    ]
}

impl Default for FactCheck {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_factcheck_base_url(),
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            default_language: default_language(),
        }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl(),
            memory_capacity: default_memory_capacity(),
            namespace: default_namespace(),
        }
    }
}

impl Default for Validation {
    fn default() -> Self {
        Self {
            min_claim_length: default_min_claim_length(),
            max_claim_length: default_max_claim_length(),
            prohibited_patterns: default_prohibited_patterns(),
        }
    }
}

impl App {
    pub fn media_dir(&self) -> PathBuf {
        Path::new(&self.data_dir).join("media")
    }

    pub fn temp_dir(&self) -> PathBuf {
        Path::new(&self.data_dir).join("temp")
    }

    pub fn models_dir(&self) -> PathBuf {
        Path::new(&self.data_dir).join("models")
    }
}

impl Config {
    /// Ensure `data_dir` and its `models`, `media` and `temp` subdirectories exist.
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.app.models_dir())?;
        fs::create_dir_all(self.app.media_dir())?;
        fs::create_dir_all(self.app.temp_dir())
    }
}

/// Load configuration from a YAML file, apply environment overrides and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    apply_env(&mut cfg, |key| std::env::var(key).ok());
    validate(&cfg)?;
    Ok(cfg)
}

/// Overlay values from the process environment (the compose file wires
/// `DATABASE_URL` and `REDIS_URL` this way).
pub fn apply_env<F>(cfg: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    if let Some(v) = non_empty("TELEGRAM_TOKEN") {
        cfg.telegram.bot_token = v;
    }
    if let Some(v) = non_empty("DATABASE_URL") {
        cfg.database.url = v;
    }
    if let Some(v) = non_empty("REDIS_URL") {
        cfg.redis.url = v;
    }
    if let Some(v) = non_empty("GOOGLE_FACTCHECK_API_KEY") {
        cfg.factcheck.api_key = v;
    }
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid("app.poll_interval_ms must be > 0"));
    }
    if cfg.app.max_attempts <= 0 {
        return Err(ConfigError::Invalid("app.max_attempts must be > 0"));
    }

    if cfg.telegram.bot_token.trim().is_empty() {
        return Err(ConfigError::Invalid("telegram.bot_token must be non-empty"));
    }

    if cfg.database.url.trim().is_empty() {
        return Err(ConfigError::Invalid("database.url must be non-empty"));
    }
    if cfg.database.max_connections == 0 {
        return Err(ConfigError::Invalid("database.max_connections must be > 0"));
    }

    if cfg.factcheck.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "factcheck.request_timeout_secs must be > 0",
        ));
    }
    if cfg.factcheck.max_retries == 0 {
        return Err(ConfigError::Invalid("factcheck.max_retries must be > 0"));
    }

    if cfg.cache.memory_capacity == 0 {
        return Err(ConfigError::Invalid("cache.memory_capacity must be > 0"));
    }

    let v = &cfg.validation;
    if v.min_claim_length == 0 || v.min_claim_length > v.max_claim_length {
        return Err(ConfigError::Invalid(
            "validation.min_claim_length must be in 1..=max_claim_length",
        ));
    }
    if v
        .prohibited_patterns
        .iter()
        .any(|p| regex::Regex::new(p).is_err())
    {
        return Err(ConfigError::Invalid(
            "validation.prohibited_patterns must be valid regexes",
        ));
    }

    Ok(())
}

/// Returns the example YAML shipped with the repository.
pub fn example() -> &'static str {
    include_str!("../config.example.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.factcheck.default_language, "fa");
        assert_eq!(cfg.validation.min_claim_length, 10);
    }

    #[test]
    fn optional_sections_fall_back_to_defaults() {
        let yaml = r#"
app:
  data_dir: "./data"
  poll_interval_ms: 100
  max_backoff_seconds: 60
telegram:
  bot_token: "t"
database:
  url: "postgresql://localhost/factchecker"
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.app.max_attempts, 5);
        assert_eq!(cfg.app.health_addr, "0.0.0.0:8000");
        assert!(cfg.redis.url.is_empty());
        assert_eq!(cfg.factcheck.max_retries, 3);
        assert_eq!(cfg.cache.namespace, "factchecker");
        assert_eq!(cfg.validation.max_claim_length, 1000);
        assert_eq!(cfg.validation.prohibited_patterns.len(), 2);
    }

    #[test]
    fn invalid_bot_token() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.telegram.bot_token = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("telegram.bot_token")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_database_and_limits() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.database.url = " ".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("database.url")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.poll_interval_ms = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.validation.min_claim_length = 2000;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.validation.prohibited_patterns = vec!["(unclosed".into()];
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "postgresql://postgres:postgres@db:5432/factchecker"),
            ("REDIS_URL", "redis://redis:6379/0"),
            ("TELEGRAM_TOKEN", ""),
        ]
        .into_iter()
        .collect();
        apply_env(&mut cfg, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(
            cfg.database.url,
            "postgresql://postgres:postgres@db:5432/factchecker"
        );
        assert_eq!(cfg.redis.url, "redis://redis:6379/0");
        // empty values do not clobber the file
        assert_eq!(cfg.telegram.bot_token, "YOUR_TELEGRAM_BOT_TOKEN");
    }

    #[test]
    fn ensure_dirs_creates_layout() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.join("models").exists());
        assert!(data_path.join("media").exists());
        assert!(data_path.join("temp").exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.telegram.admin_user_ids, vec![123456789]);
    }
}
