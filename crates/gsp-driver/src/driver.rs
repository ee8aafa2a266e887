//! `Driver`: the single public entry point, `execute_order`, wiring
//! together browser launch, the fixed step pipeline, the adaptive
//! navigation loop, file upload and result assembly (spec.md §4.3).

use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use futures_util::StreamExt;
use gsp_core::{step_progress_percent, LogLevel, StepLogEntry};
use gsp_telemetry::Metrics;
use tracing::{error, warn};

use crate::browser::BrowserSession;
use crate::config::{BrowserDriverConfig, STEALTH_INIT_SCRIPT};
use crate::error::{DriverError, DriverResult};
use crate::excel::{cleanup_order_sheet, write_order_sheet, ProductLine};
use crate::navigation::{audit_and_clean_cart, navigate_to_cart_adaptively, validate_upload};
use crate::pipeline;
use crate::result::{OrderResult, ProductAdded, ProgressCallback};
use crate::selectors;

const UPLOAD_FILE_INPUT_TIMEOUT: Duration = Duration::from_secs(60);
const UPLOAD_PROCESSING_WAIT: Duration = Duration::from_secs(15);

pub struct Driver {
    config: BrowserDriverConfig,
}

impl Driver {
    #[must_use]
    pub fn new(config: BrowserDriverConfig) -> Self {
        Self { config }
    }

    /// The driver's sole public contract (spec.md §4.3). `on_progress`
    /// fires at every step boundary with `(step, message)`; the caller
    /// resolves the percentage via `gsp_core::step_progress_percent`.
    pub async fn execute_order(
        &self,
        consultora_code: &str,
        products: &[ProductLine],
        on_progress: ProgressCallback<'_>,
    ) -> OrderResult {
        let start = Instant::now();
        let mut step_log: Vec<StepLogEntry> = Vec::new();
        let mut current_step = "starting".to_string();

        let report = |step: &str, message: &str| {
            on_progress(step, message);
        };
        report("starting", "launching browser");

        match self
            .run_pipeline(consultora_code, products, &mut step_log, &mut current_step, &report)
            .await
        {
            Ok((added, failed)) => {
                step_log.push(StepLogEntry::new(
                    LogLevel::Info,
                    "completed",
                    "order pipeline completed",
                ));
                report("completed", "done");
                OrderResult {
                    success: true,
                    error: None,
                    error_step: None,
                    screenshot_path: None,
                    duration_seconds: start.elapsed().as_secs_f64(),
                    products_added: added,
                    products_failed: failed,
                    step_log,
                    current_step: "completed".into(),
                }
            }
            Err(err) => {
                let step = err.step().to_string();
                let screenshot_path = err.screenshot_path().cloned();
                error!(step = %step, error = %err, "order pipeline failed");
                step_log.push(
                    StepLogEntry::new(LogLevel::Error, step.clone(), err.to_string()).with_screenshot(
                        screenshot_path
                            .as_ref()
                            .map(|p| p.display().to_string())
                            .unwrap_or_default(),
                    ),
                );
                OrderResult {
                    success: false,
                    error: Some(err.to_string()),
                    error_step: Some(step.clone()),
                    screenshot_path,
                    duration_seconds: start.elapsed().as_secs_f64(),
                    products_added: Vec::new(),
                    products_failed: Vec::new(),
                    step_log,
                    current_step: step,
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        consultora_code: &str,
        products: &[ProductLine],
        step_log: &mut Vec<StepLogEntry>,
        current_step: &mut String,
        report: &dyn Fn(&str, &str),
    ) -> DriverResult<(Vec<ProductAdded>, Vec<crate::result::ProductFailed>)> {
        let session = self.launch().await?;
        *current_step = "preflight".into();
        report("preflight", "browser context ready");

        let step_started = Instant::now();
        pipeline::login(&session, &self.config).await?;
        Metrics::driver_step_duration("login", step_started.elapsed().as_secs_f64());
        *current_step = "login".into();
        report("login", "logged in");
        step_log.push(StepLogEntry::new(LogLevel::Info, "login", "login succeeded"));

        let step_started = Instant::now();
        pipeline::select_otra_consultora(&session, &self.config).await?;
        Metrics::driver_step_duration("impersonation", step_started.elapsed().as_secs_f64());
        *current_step = "impersonation".into();
        report("impersonation", "selected 'otra consultora'");

        let step_started = Instant::now();
        pipeline::search_consultora(&session, consultora_code).await?;
        Metrics::driver_step_duration("search", step_started.elapsed().as_secs_f64());
        *current_step = "search".into();
        report("search", format!("searched for {consultora_code}").as_str());

        let step_started = Instant::now();
        pipeline::confirm_consultora(&session, &self.config).await?;
        Metrics::driver_step_duration("confirm", step_started.elapsed().as_secs_f64());
        *current_step = "confirm".into();
        report("confirm", "consultora confirmed");

        let step_started = Instant::now();
        let cycle_log = pipeline::select_cycle(&session, &self.config).await?;
        Metrics::driver_step_duration("select_cycle", step_started.elapsed().as_secs_f64());
        step_log.extend(cycle_log);
        *current_step = "select_cycle".into();
        report("select_cycle", "cycle selected");

        let temp_dir = std::env::temp_dir();
        let sheet_path = write_order_sheet(products, &temp_dir)?;
        *current_step = "excel_generation".into();
        report("excel_generation", "order sheet generated");

        let origin = self.origin_from_login_url();
        let step_started = Instant::now();
        let nav_result = navigate_to_cart_adaptively(&session, &origin).await;
        Metrics::driver_step_duration("navigate_to_cart_adaptively", step_started.elapsed().as_secs_f64());
        *current_step = "navigate_to_cart_adaptively".into();
        let nav_log = match nav_result {
            Ok(log) => log,
            Err(err) => {
                cleanup_order_sheet(&sheet_path).await;
                return Err(err);
            }
        };
        step_log.extend(nav_log);
        report("navigate_to_cart_adaptively", "arrived at cart");

        let step_started = Instant::now();
        let cart_result = audit_and_clean_cart(&session).await;
        Metrics::driver_step_duration("cart_cleanup", step_started.elapsed().as_secs_f64());
        let cart_log = match cart_result {
            Ok(log) => log,
            Err(err) => {
                cleanup_order_sheet(&sheet_path).await;
                return Err(err);
            }
        };
        step_log.extend(cart_log);
        *current_step = "cart_cleanup".into();
        report("cart_cleanup", "cart cleaned");

        let step_started = Instant::now();
        let upload_result = self.upload_file(&session, &sheet_path).await;
        Metrics::driver_step_duration("upload_order_file", step_started.elapsed().as_secs_f64());
        cleanup_order_sheet(&sheet_path).await;
        upload_result?;
        *current_step = "upload_order_file".into();
        report("upload_order_file", "file uploaded");

        let step_started = Instant::now();
        let validation_log = validate_upload(&session).await?;
        Metrics::driver_step_duration("upload_validation", step_started.elapsed().as_secs_f64());
        step_log.extend(validation_log);
        *current_step = "upload_validation".into();
        report("upload_validation", "post-upload validation complete");

        // Optimistic per-product reporting (spec.md §9 Open Question):
        // every requested product is recorded as submitted unless
        // validation produced a negative signal the portal exposes no
        // finer-grained acceptance API for.
        let added = products
            .iter()
            .map(|p| ProductAdded {
                product_code: p.product_code.clone(),
                quantity: p.quantity,
            })
            .collect();

        Ok((added, Vec::new()))
    }

    async fn launch(&self) -> DriverResult<BrowserSession> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.config.viewport_width, self.config.viewport_height)
            .user_agent(self.config.user_agent.clone())
            .arg(format!("--lang={}", self.config.locale))
            .arg("--disable-blink-features=AutomationControlled");

        if self.config.ignore_cert_errors() {
            builder = builder.arg("--ignore-certificate-errors");
        }
        if let Some(proxy) = self.config.https_proxy.as_ref().or(self.config.http_proxy.as_ref()) {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        builder = if self.config.headless {
            builder.headless_mode(HeadlessMode::True)
        } else {
            builder.headless_mode(HeadlessMode::False)
        };

        let config = builder
            .build()
            .map_err(|err| DriverError::Launch(err.to_string()))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| DriverError::Launch(err.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    warn!(error = %err, "chromiumoxide handler event error");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(DriverError::Cdp)?;
        page.evaluate_on_new_document(STEALTH_INIT_SCRIPT)
            .await
            .map_err(DriverError::Cdp)?;

        Ok(BrowserSession::new(
            page,
            self.config.step_timeout,
            self.config.screenshot_dir.clone(),
            self.config.screenshot_on_error,
        ))
    }

    async fn upload_file(
        &self,
        session: &BrowserSession,
        sheet_path: &std::path::Path,
    ) -> DriverResult<()> {
        // Import button is optional — some flows pre-mount the widget.
        session.click_first(selectors::IMPORT_BUTTON).await?;

        if session
            .wait_for(selectors::FILE_INPUT, UPLOAD_FILE_INPUT_TIMEOUT)
            .await
            .is_err()
        {
            let screenshot_path = session.screenshot("upload_order_file").await;
            return Err(DriverError::Cart {
                step: "upload_order_file".into(),
                message: "file input never became attached to the DOM".into(),
                screenshot_path,
            });
        }

        session
            .set_file_input(selectors::FILE_INPUT, sheet_path)
            .await?;

        tokio::time::sleep(UPLOAD_PROCESSING_WAIT).await;
        Ok(())
    }

    /// `scheme://host[:port]` prefix of the configured login URL, used
    /// as the base for the adaptive loop's direct `/cart` navigation.
    fn origin_from_login_url(&self) -> String {
        let url = &self.config.login_url;
        let after_scheme = match url.find("://") {
            Some(idx) => &url[idx + 3..],
            None => return url.clone(),
        };
        let authority_len = after_scheme.find('/').unwrap_or(after_scheme.len());
        let scheme_len = url.len() - after_scheme.len();
        url[..scheme_len + authority_len].to_string()
    }

    /// Resolve the display percentage for a step tag, falling back to
    /// the previous known value when the tag is unrecognized (spec.md
    /// §4.3.4).
    #[must_use]
    pub fn progress_percent(step: &str, last_known: u8) -> u8 {
        step_progress_percent(step).unwrap_or(last_known)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_percent_falls_back_to_last_known_for_unrecognized_step() {
        assert_eq!(Driver::progress_percent("not_a_step", 42), 42);
        assert_eq!(Driver::progress_percent("login", 5), 15);
    }

    #[test]
    fn origin_strips_path_from_login_url() {
        let driver = Driver::new(BrowserDriverConfig {
            login_url: "https://portal.example.com/login/index.html".into(),
            ..Default::default()
        });
        assert_eq!(driver.origin_from_login_url(), "https://portal.example.com");
    }
}
