//! Browser driver error taxonomy (spec.md §7).
//!
//! Every variant carries the step it failed at and, where a screenshot was
//! captured, the path it was written to. This is the Rust-native
//! equivalent of the original `GSPBotError` base class's constructor
//! parameters — one enum instead of a class hierarchy.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("login failed at step {step}: {message}")]
    Login {
        step: String,
        message: String,
        screenshot_path: Option<PathBuf>,
    },

    #[error("consultora search failed at step {step}: {message}")]
    ConsultoraSearch {
        step: String,
        message: String,
        screenshot_path: Option<PathBuf>,
    },

    #[error("cycle selection failed at step {step}: {message}")]
    CycleSelection {
        step: String,
        message: String,
        screenshot_path: Option<PathBuf>,
    },

    #[error("cart error at step {step}: {message}")]
    Cart {
        step: String,
        message: String,
        screenshot_path: Option<PathBuf>,
    },

    #[error("product {product_code} could not be added: {message}")]
    ProductAdd {
        step: String,
        product_code: String,
        message: String,
        screenshot_path: Option<PathBuf>,
    },

    #[error("navigation failed at step {step}: {message}")]
    Navigation {
        step: String,
        message: String,
        screenshot_path: Option<PathBuf>,
    },

    #[error("session expired at step {step}")]
    SessionExpired {
        step: String,
        screenshot_path: Option<PathBuf>,
    },

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("chrome devtools protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("spreadsheet generation failed: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    #[must_use]
    pub fn step(&self) -> &str {
        match self {
            DriverError::Login { step, .. }
            | DriverError::ConsultoraSearch { step, .. }
            | DriverError::CycleSelection { step, .. }
            | DriverError::Cart { step, .. }
            | DriverError::ProductAdd { step, .. }
            | DriverError::Navigation { step, .. }
            | DriverError::SessionExpired { step, .. } => step,
            DriverError::Launch(_) => "launch",
            DriverError::Cdp(_) => "cdp",
            DriverError::Spreadsheet(_) => "excel_generation",
            DriverError::Io(_) => "io",
        }
    }

    #[must_use]
    pub fn screenshot_path(&self) -> Option<&PathBuf> {
        match self {
            DriverError::Login {
                screenshot_path, ..
            }
            | DriverError::ConsultoraSearch {
                screenshot_path, ..
            }
            | DriverError::CycleSelection {
                screenshot_path, ..
            }
            | DriverError::Cart {
                screenshot_path, ..
            }
            | DriverError::ProductAdd {
                screenshot_path, ..
            }
            | DriverError::Navigation {
                screenshot_path, ..
            }
            | DriverError::SessionExpired {
                screenshot_path, ..
            } => screenshot_path.as_ref(),
            _ => None,
        }
    }
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_accessor_matches_constructed_variant() {
        let err = DriverError::Navigation {
            step: "navigate_to_cart_adaptively".into(),
            message: "exhausted".into(),
            screenshot_path: None,
        };
        assert_eq!(err.step(), "navigate_to_cart_adaptively");
    }
}
