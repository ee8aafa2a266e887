//! Application configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Browser launch tunables, converted into `gsp_driver::BrowserDriverConfig`
/// once `login_url`/`user_code`/`password` have been resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub login_url: String,
    /// Never populated from the TOML file — see [`AppConfig::load`].
    #[serde(skip)]
    pub user_code: String,
    #[serde(skip)]
    pub password: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub slow_mo_ms: u64,
    #[serde(default = "default_screenshot_on_error")]
    pub screenshot_on_error: bool,
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: String,
    #[serde(default)]
    pub http_proxy: Option<String>,
    #[serde(default)]
    pub https_proxy: Option<String>,
}

fn default_headless() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_screenshot_on_error() -> bool {
    true
}

fn default_screenshot_dir() -> String {
    "./screenshots".to_string()
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            login_url: String::new(),
            user_code: String::new(),
            password: String::new(),
            headless: default_headless(),
            timeout_ms: default_timeout_ms(),
            slow_mo_ms: 0,
            screenshot_on_error: default_screenshot_on_error(),
            screenshot_dir: default_screenshot_dir(),
            http_proxy: None,
            https_proxy: None,
        }
    }
}

impl From<BrowserConfig> for gsp_driver::BrowserDriverConfig {
    fn from(cfg: BrowserConfig) -> Self {
        Self {
            login_url: cfg.login_url,
            user_code: cfg.user_code,
            password: cfg.password,
            headless: cfg.headless,
            step_timeout: Duration::from_millis(cfg.timeout_ms),
            slow_mo: Duration::from_millis(cfg.slow_mo_ms),
            screenshot_on_error: cfg.screenshot_on_error,
            screenshot_dir: std::path::PathBuf::from(cfg.screenshot_dir),
            http_proxy: cfg.http_proxy,
            https_proxy: cfg.https_proxy,
            ..gsp_driver::BrowserDriverConfig::default()
        }
    }
}

/// Store/queue connection settings. The queue shares the store's
/// connection pool by default (§6: `QUEUE_BROKER_URL` defaults to the
/// store's own DSN) — both a worker process and the control-API process
/// construct their own pool from this at startup, never inheriting one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,
    #[serde(default = "default_postgres_db")]
    pub postgres_db: String,
    #[serde(default = "default_postgres_user")]
    pub postgres_user: String,
    /// Never populated from the TOML file — see [`AppConfig::load`].
    #[serde(skip)]
    pub postgres_password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub queue_broker_url: Option<String>,
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_db() -> String {
    "gsp".to_string()
}

fn default_postgres_user() -> String {
    "gsp".to_string()
}

fn default_max_connections() -> u32 {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            postgres_host: default_postgres_host(),
            postgres_port: default_postgres_port(),
            postgres_db: default_postgres_db(),
            postgres_user: default_postgres_user(),
            postgres_password: String::new(),
            max_connections: default_max_connections(),
            queue_broker_url: None,
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.postgres_user,
            self.postgres_password,
            self.postgres_host,
            self.postgres_port,
            self.postgres_db
        )
    }

    #[must_use]
    pub fn queue_url(&self) -> String {
        self.queue_broker_url.clone().unwrap_or_else(|| self.database_url())
    }
}

/// Worker-pool sizing. Prefetch is forced to 1 regardless of
/// `queue_concurrency` (§5: effective prefetch is always 1 per worker).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_queue_concurrency")]
    pub queue_concurrency: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_worker_count() -> usize {
    3
}

fn default_queue_concurrency() -> usize {
    1
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            queue_concurrency: default_queue_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Retry policy defaults used when enqueuing order tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: i64,
}

fn default_max_retries() -> i32 {
    3
}

fn default_retry_delay_seconds() -> i64 {
    60
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_seconds: default_retry_delay_seconds(),
        }
    }
}

/// Top-level application configuration, aggregating one sub-config per
/// concern.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: gsp_api::ApiConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub worker: WorkerPoolConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl AppConfig {
    /// Load configuration: CLI flag > `GSP_CONFIG` env var > default path.
    /// Missing file is not fatal as long as every required field has a
    /// default or an env override; secrets must come from the
    /// environment and are validated last.
    pub fn load(config_path: Option<&str>) -> AppResult<Self> {
        let path = config_path
            .map(str::to_string)
            .or_else(|| std::env::var("GSP_CONFIG").ok())
            .unwrap_or_else(|| "gsp-bot.toml".to_string());

        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            tracing::warn!(path = %path, "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate_secrets()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("failed to read config file {path}: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("failed to parse config file {path}: {e}")))
    }

    /// Applies the environment variables named in §6 over whatever the
    /// file (or defaults) supplied. Secrets are *only* ever read here.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("GSP_LOGIN_URL") {
            self.browser.login_url = v;
        }
        self.browser.user_code = std::env::var("GSP_USER_CODE").unwrap_or_default();
        self.browser.password = std::env::var("GSP_PASSWORD").unwrap_or_default();

        if let Ok(v) = std::env::var("POSTGRES_HOST") {
            self.store.postgres_host = v;
        }
        if let Some(v) = std::env::var("POSTGRES_PORT").ok().and_then(|v| v.parse().ok()) {
            self.store.postgres_port = v;
        }
        if let Ok(v) = std::env::var("POSTGRES_DB") {
            self.store.postgres_db = v;
        }
        if let Ok(v) = std::env::var("POSTGRES_USER") {
            self.store.postgres_user = v;
        }
        self.store.postgres_password = std::env::var("POSTGRES_PASSWORD").unwrap_or_default();

        if let Some(v) = std::env::var("WORKER_COUNT").ok().and_then(|v| v.parse().ok()) {
            self.worker.worker_count = v;
        }
        if let Some(v) = std::env::var("QUEUE_CONCURRENCY").ok().and_then(|v| v.parse().ok()) {
            self.worker.queue_concurrency = v;
        }
        if let Some(v) = std::env::var("MAX_RETRIES").ok().and_then(|v| v.parse().ok()) {
            self.retry.max_retries = v;
        }
        if let Some(v) = std::env::var("RETRY_DELAY_SECONDS").ok().and_then(|v| v.parse().ok()) {
            self.retry.retry_delay_seconds = v;
        }

        if let Some(v) = std::env::var("PLAYWRIGHT_HEADLESS").ok().and_then(|v| v.parse().ok()) {
            self.browser.headless = v;
        }
        if let Some(v) = std::env::var("BROWSER_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()) {
            self.browser.timeout_ms = v;
        }
        if let Some(v) = std::env::var("BROWSER_SLOW_MO_MS").ok().and_then(|v| v.parse().ok()) {
            self.browser.slow_mo_ms = v;
        }
        if let Some(v) = std::env::var("SCREENSHOT_ON_ERROR").ok().and_then(|v| v.parse().ok()) {
            self.browser.screenshot_on_error = v;
        }
        if let Ok(v) = std::env::var("SCREENSHOT_DIR") {
            self.api.screenshot_dir = v.clone();
            self.browser.screenshot_dir = v;
        }
        if let Ok(v) = std::env::var("HTTP_PROXY") {
            self.browser.http_proxy = Some(v);
        }
        if let Ok(v) = std::env::var("HTTPS_PROXY") {
            self.browser.https_proxy = Some(v);
        }
    }

    fn validate_secrets(&self) -> AppResult<()> {
        if self.browser.user_code.is_empty() {
            return Err(AppError::Config("GSP_USER_CODE must be set".to_string()));
        }
        if self.browser.password.is_empty() {
            return Err(AppError::Config("GSP_PASSWORD must be set".to_string()));
        }
        if self.browser.login_url.is_empty() {
            return Err(AppError::Config(
                "login_url must be set (config file or GSP_LOGIN_URL)".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("worker_count"));
        let reparsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.worker.worker_count, config.worker.worker_count);
    }

    #[test]
    fn secrets_never_deserialize_from_file() {
        let toml_str = r#"
            [browser]
            user_code = "should-be-ignored"
            password = "should-be-ignored"
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.browser.user_code, "");
        assert_eq!(config.browser.password, "");
    }

    #[test]
    fn queue_url_defaults_to_store_database_url() {
        let store = StoreConfig::default();
        assert_eq!(store.queue_url(), store.database_url());
    }
}
