//! The driver's public return type and progress-callback contract
//! (spec.md §4.3 "Public contract").

use std::path::PathBuf;

use async_trait::async_trait;
use gsp_core::StepLogEntry;

#[derive(Debug, Clone)]
pub struct ProductAdded {
    pub product_code: String,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct ProductFailed {
    pub product_code: String,
    pub error: String,
}

/// Returned by `Driver::execute_order` regardless of outcome; the worker
/// branches on `success` and persists the rest unconditionally.
#[derive(Debug, Clone)]
pub struct OrderResult {
    pub success: bool,
    pub error: Option<String>,
    pub error_step: Option<String>,
    pub screenshot_path: Option<PathBuf>,
    pub duration_seconds: f64,
    pub products_added: Vec<ProductAdded>,
    pub products_failed: Vec<ProductFailed>,
    pub step_log: Vec<StepLogEntry>,
    pub current_step: String,
}

/// Fired at every step boundary (spec.md §4.3: "Progress callbacks fire
/// at every step boundary"). `percent` is looked up via
/// `gsp_core::step_progress_percent`, with the caller responsible for
/// holding onto the last known value when a tag is unrecognized.
pub type ProgressCallback<'a> = Box<dyn Fn(&str, &str) + Send + Sync + 'a>;

/// Object-safe seam between `gsp-worker` and the concrete browser
/// driver, so worker lifecycle tests can swap in a fake that never
/// launches a real browser.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn execute_order(
        &self,
        consultora_code: &str,
        products: &[crate::excel::ProductLine],
        on_progress: ProgressCallback<'_>,
    ) -> OrderResult;
}

#[async_trait]
impl OrderExecutor for crate::driver::Driver {
    async fn execute_order(
        &self,
        consultora_code: &str,
        products: &[crate::excel::ProductLine],
        on_progress: ProgressCallback<'_>,
    ) -> OrderResult {
        crate::driver::Driver::execute_order(self, consultora_code, products, on_progress).await
    }
}
