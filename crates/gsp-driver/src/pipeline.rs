//! Steps 2–6 of the fixed pipeline (spec.md §4.3): login, impersonation,
//! search, confirm, cycle selection. Each function is a strictly
//! sequential, bounded-wait interaction block; on timeout or selector
//! miss it captures a screenshot and returns a typed error.

use std::time::Duration;

use gsp_core::{LogLevel, StepLogEntry};
use tracing::info;

use crate::browser::BrowserSession;
use crate::config::BrowserDriverConfig;
use crate::error::{DriverError, DriverResult};
use crate::selectors;

const LOGIN_READY_TIMEOUT: Duration = Duration::from_secs(60);
const LOGIN_NAV_RETRIES: u32 = 3;

/// Step 2: login (spec.md §4.3 step 2).
pub async fn login(session: &BrowserSession, config: &BrowserDriverConfig) -> DriverResult<()> {
    let mut last_err = None;
    for attempt in 1..=LOGIN_NAV_RETRIES {
        match session.goto(&config.login_url).await {
            Ok(()) => {
                last_err = None;
                break;
            }
            Err(err) => {
                info!(attempt, error = %err, "login navigation attempt failed, retrying");
                last_err = Some(err);
            }
        }
    }
    if let Some(err) = last_err {
        let screenshot_path = session.screenshot("login").await;
        return Err(DriverError::Login {
            step: "login".into(),
            message: format!("navigation failed after {LOGIN_NAV_RETRIES} attempts: {err}"),
            screenshot_path,
        });
    }

    if !session
        .click_first(selectors::LOGIN_MODE_COMBOBOX)
        .await?
    {
        let screenshot_path = session.screenshot("login").await;
        return Err(DriverError::Login {
            step: "login".into(),
            message: "login mode combobox not found".into(),
            screenshot_path,
        });
    }
    session
        .click_first(&[crate::selectors::Locator::Text(
            selectors::LOGIN_CODE_OPTION_TEXT,
        )])
        .await?;

    session
        .fill_first(selectors::LOGIN_USER_INPUT, &config.user_code)
        .await?;
    session
        .fill_first(selectors::LOGIN_PASSWORD_INPUT, &config.password)
        .await?;

    if !session.click_first(selectors::LOGIN_SUBMIT_BUTTON).await? {
        let screenshot_path = session.screenshot("login").await;
        return Err(DriverError::Login {
            step: "login".into(),
            message: "login submit button not found".into(),
            screenshot_path,
        });
    }

    if session
        .wait_for(selectors::IMPERSONATION_READY_LABEL, LOGIN_READY_TIMEOUT)
        .await
        .is_err()
    {
        let screenshot_path = session.screenshot("login").await;
        return Err(DriverError::Login {
            step: "login".into(),
            message: "impersonation radio did not appear after login".into(),
            screenshot_path,
        });
    }

    Ok(())
}

/// Step 3: impersonation (`select_otra_consultora`).
pub async fn select_otra_consultora(
    session: &BrowserSession,
    config: &BrowserDriverConfig,
) -> DriverResult<()> {
    if !session.click_first(selectors::IMPERSONATION_RADIO).await? {
        let screenshot_path = session.screenshot("impersonation").await;
        return Err(DriverError::ConsultoraSearch {
            step: "impersonation".into(),
            message: "'otra consultora' radio not found".into(),
            screenshot_path,
        });
    }
    // Accept button is optional — some portal builds confirm immediately.
    session
        .click_first(selectors::IMPERSONATION_ACCEPT_BUTTON)
        .await?;

    if session
        .wait_for(selectors::CONSULTORA_CODE_INPUT, config.step_timeout)
        .await
        .is_err()
    {
        let screenshot_path = session.screenshot("impersonation").await;
        return Err(DriverError::ConsultoraSearch {
            step: "impersonation".into(),
            message: "consultora code input did not become visible".into(),
            screenshot_path,
        });
    }
    Ok(())
}

/// Step 4: search (`search_consultora`).
pub async fn search_consultora(session: &BrowserSession, consultora_code: &str) -> DriverResult<()> {
    if !session
        .fill_first(selectors::CONSULTORA_CODE_INPUT, consultora_code)
        .await?
    {
        let screenshot_path = session.screenshot("search").await;
        return Err(DriverError::ConsultoraSearch {
            step: "search".into(),
            message: "consultora code input not found".into(),
            screenshot_path,
        });
    }
    if !session
        .click_first(selectors::CONSULTORA_SEARCH_BUTTON)
        .await?
    {
        let screenshot_path = session.screenshot("search").await;
        return Err(DriverError::ConsultoraSearch {
            step: "search".into(),
            message: "search button not found".into(),
            screenshot_path,
        });
    }
    Ok(())
}

/// Step 5: confirm (`confirm_consultora`).
pub async fn confirm_consultora(
    session: &BrowserSession,
    config: &BrowserDriverConfig,
) -> DriverResult<()> {
    if session
        .click_first_waiting(selectors::CONSULTORA_CONFIRM_BUTTON, config.step_timeout)
        .await
        .is_err()
    {
        let screenshot_path = session.screenshot("confirm").await;
        return Err(DriverError::ConsultoraSearch {
            step: "confirm".into(),
            message: "confirm button did not appear".into(),
            screenshot_path,
        });
    }
    Ok(())
}

/// Step 6: cycle selection (`select_cycle`). Selects the first available
/// radio in DOM order — a deterministic tie-break per spec.md §4.3 step 6.
pub async fn select_cycle(
    session: &BrowserSession,
    config: &BrowserDriverConfig,
) -> DriverResult<Vec<StepLogEntry>> {
    if session
        .wait_for(selectors::CYCLE_RADIO_GROUP, config.step_timeout)
        .await
        .is_err()
    {
        let screenshot_path = session.screenshot("select_cycle").await;
        return Err(DriverError::CycleSelection {
            step: "select_cycle".into(),
            message: "cycle radio group did not appear".into(),
            screenshot_path,
        });
    }

    if !session.click_first(selectors::CYCLE_RADIO_ITEM).await? {
        let screenshot_path = session.screenshot("select_cycle").await;
        return Err(DriverError::CycleSelection {
            step: "select_cycle".into(),
            message: "no cycle radio option available".into(),
            screenshot_path,
        });
    }

    if !session.click_first(selectors::CYCLE_ACCEPT_BUTTON).await? {
        let screenshot_path = session.screenshot("select_cycle").await;
        return Err(DriverError::CycleSelection {
            step: "select_cycle".into(),
            message: "cycle accept button not found".into(),
            screenshot_path,
        });
    }

    Ok(vec![StepLogEntry::new(
        LogLevel::Info,
        "select_cycle",
        "selected first available cycle (DOM order)",
    )])
}
