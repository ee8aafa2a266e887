//! Thin wrapper over a `chromiumoxide::Page`: resolves `Locator` lists,
//! applies bounded waits, and captures screenshots on failure.
//!
//! Nothing here is portal-specific — the step pipeline in `pipeline.rs`
//! and the adaptive loop in `navigation.rs` are the only callers, and
//! they only ever see `SelectorList`s, never raw CSS strings.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{DriverError, DriverResult};
use crate::selectors::{Locator, SelectorList};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Exposed so callers that need a raw element count (cart-row auditing)
/// can reuse the same CSS translation this module uses internally.
#[must_use]
pub fn css_for(locator: &Locator) -> Option<String> {
    match locator {
        Locator::TestId(id) => Some(format!("[data-testid=\"{id}\"]")),
        Locator::Role(role, _name) => Some(format!("[role=\"{role}\"]")),
        Locator::Css(css) => Some((*css).to_string()),
        Locator::Text(_) => None,
    }
}

/// Session wrapper for one order's browser context.
pub struct BrowserSession {
    page: Page,
    step_timeout: Duration,
    screenshot_dir: PathBuf,
    screenshot_on_error: bool,
    /// Unique per invocation so concurrent orders failing at the same
    /// step never clobber each other's screenshot file.
    session_tag: String,
}

impl BrowserSession {
    #[must_use]
    pub fn new(
        page: Page,
        step_timeout: Duration,
        screenshot_dir: PathBuf,
        screenshot_on_error: bool,
    ) -> Self {
        Self {
            page,
            step_timeout,
            screenshot_dir,
            screenshot_on_error,
            session_tag: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub async fn goto(&self, url: &str) -> DriverResult<()> {
        self.page.goto(url).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    pub async fn current_url(&self) -> DriverResult<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    /// Finds the first element matched by any strategy in `locators`,
    /// preferring earlier (more robust) strategies. Returns immediately
    /// on first match without waiting — use `wait_for` when the element
    /// may not exist yet.
    pub async fn find_first(&self, locators: SelectorList) -> DriverResult<Option<Element>> {
        for locator in locators {
            if let Some(css) = css_for(locator) {
                if let Ok(el) = self.page.find_element(css.as_str()).await {
                    return Ok(Some(el));
                }
            } else if let Locator::Text(text) = locator {
                if let Some(el) = self.find_by_text(text).await? {
                    return Ok(Some(el));
                }
            }
        }
        Ok(None)
    }

    /// Text locators have no CSS equivalent, so matching runs in-page:
    /// scan common interactive elements for one whose `textContent`
    /// contains the needle, then resolve that DOM node back into an
    /// `Element` handle via its own generated CSS path.
    async fn find_by_text(&self, needle: &str) -> DriverResult<Option<Element>> {
        let script = format!(
            r#"(() => {{
                const escaped = {needle:?};
                const candidates = document.querySelectorAll(
                    'button, a, [role], .modal, .dialog, .popup, div, span, label'
                );
                for (const el of candidates) {{
                    if (el.textContent && el.textContent.includes(escaped) && el.offsetParent !== null) {{
                        if (!el.dataset.gspProbe) {{
                            el.dataset.gspProbe = 'probe-' + Math.random().toString(36).slice(2);
                        }}
                        return el.dataset.gspProbe;
                    }}
                }}
                return null;
            }})()"#
        );
        let marker: Option<String> = self.page.evaluate(script).await?.into_value().ok();
        match marker {
            Some(marker) => {
                let css = format!("[data-gsp-probe=\"{marker}\"]");
                Ok(self.page.find_element(css.as_str()).await.ok())
            }
            None => Ok(None),
        }
    }

    /// Polls `find_first` until a match appears or `timeout` elapses.
    pub async fn wait_for(
        &self,
        locators: SelectorList,
        timeout: Duration,
    ) -> DriverResult<Element> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(el) = self.find_first(locators).await? {
                return Ok(el);
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Navigation {
                    step: "wait_for".into(),
                    message: "timed out waiting for element".into(),
                    screenshot_path: None,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// `true` as soon as any strategy resolves, without waiting out the
    /// full timeout — used by the adaptive loop's popup inspection, which
    /// must not block on popups that never appear.
    pub async fn is_visible(&self, locators: SelectorList) -> DriverResult<bool> {
        Ok(self.find_first(locators).await?.is_some())
    }

    pub async fn click_first(&self, locators: SelectorList) -> DriverResult<bool> {
        match self.find_first(locators).await? {
            Some(el) => {
                el.click().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn click_first_waiting(
        &self,
        locators: SelectorList,
        timeout: Duration,
    ) -> DriverResult<()> {
        let el = self.wait_for(locators, timeout).await?;
        el.click().await?;
        Ok(())
    }

    pub async fn fill_first(&self, locators: SelectorList, text: &str) -> DriverResult<bool> {
        match self.find_first(locators).await? {
            Some(el) => {
                el.click().await?;
                el.type_str(text).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn set_file_input(&self, locators: SelectorList, path: &Path) -> DriverResult<()> {
        let el = self.wait_for(locators, self.step_timeout).await?;
        el.set_file_input(vec![path]).await?;
        Ok(())
    }

    pub async fn reload(&self) -> DriverResult<()> {
        self.page.reload().await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    /// Captures a full-page screenshot for `step` into the session's
    /// configured directory, named uniquely per session so concurrent
    /// orders failing at the same step never overwrite each other's
    /// file. Returns `None` without capturing anything when
    /// `SCREENSHOT_ON_ERROR` is disabled.
    pub async fn screenshot(&self, step: &str) -> Option<PathBuf> {
        if !self.screenshot_on_error {
            return None;
        }
        let dir = self.screenshot_dir.as_path();
        let path = dir.join(format!("{step}-{}.png", self.session_tag));
        if let Err(err) = tokio::fs::create_dir_all(dir).await {
            warn!(error = %err, "could not create screenshot directory");
            return None;
        }
        let params = chromiumoxide::page::ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        match self.page.screenshot(params).await {
            Ok(bytes) => match tokio::fs::write(&path, bytes).await {
                Ok(()) => {
                    debug!(path = %path.display(), "saved failure screenshot");
                    Some(path)
                }
                Err(err) => {
                    warn!(error = %err, "failed to write screenshot");
                    None
                }
            },
            Err(err) => {
                warn!(error = %err, "failed to capture screenshot");
                None
            }
        }
    }
}
