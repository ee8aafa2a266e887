//! Browser launch configuration (spec.md §4.3 step 1, "Launch").

use std::time::Duration;

/// Tunables for one browser context. A fresh `BrowserDriverConfig` is
/// read once at process start; every `execute_order` call launches its
/// own browser from the same config, no state is shared between
/// invocations.
#[derive(Debug, Clone)]
pub struct BrowserDriverConfig {
    pub login_url: String,
    pub user_code: String,
    pub password: String,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub locale: String,
    pub timezone_id: String,
    pub user_agent: String,
    pub step_timeout: Duration,
    pub slow_mo: Duration,
    pub screenshot_on_error: bool,
    pub screenshot_dir: std::path::PathBuf,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
}

impl BrowserDriverConfig {
    #[must_use]
    pub fn ignore_cert_errors(&self) -> bool {
        true
    }
}

impl Default for BrowserDriverConfig {
    fn default() -> Self {
        Self {
            login_url: String::new(),
            user_code: String::new(),
            password: String::new(),
            headless: true,
            viewport_width: 1366,
            viewport_height: 768,
            locale: "es-CL".into(),
            timezone_id: "America/Santiago".into(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .into(),
            step_timeout: Duration::from_secs(60),
            slow_mo: Duration::ZERO,
            screenshot_on_error: true,
            screenshot_dir: std::path::PathBuf::from("./screenshots"),
            http_proxy: None,
            https_proxy: None,
        }
    }
}

/// Script injected into every new document to hide the most common
/// automation fingerprints before any portal JS runs.
pub const STEALTH_INIT_SCRIPT: &str = r"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
window.chrome = window.chrome || { runtime: {} };
Object.defineProperty(navigator, 'languages', { get: () => ['es-CL', 'es'] });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
";
