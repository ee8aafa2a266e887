//! Control API server configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: String,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_screenshot_dir() -> String {
    "./screenshots".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            port: default_port(),
            screenshot_dir: default_screenshot_dir(),
        }
    }
}
