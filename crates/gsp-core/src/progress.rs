//! Step name to progress-percentage mapping.
//!
//! Monotonically non-decreasing across the fixed pipeline order; unknown
//! tags leave the previously reported percentage unchanged (callers own
//! that "last known" state, this function is a pure lookup).

/// Canonical step tags, in pipeline order, paired with their percentage.
/// A second alias list lets driver-internal names (e.g. the impersonation
/// step's original name `select_otra_consultora`) resolve to the same
/// percentage as their canonical counterpart.
const STEPS: &[(&str, u8)] = &[
    ("starting", 0),
    ("preflight", 5),
    ("login", 15),
    ("impersonation", 25),
    ("select_otra_consultora", 25),
    ("search", 35),
    ("search_consultora", 35),
    ("confirm", 45),
    ("confirm_consultora", 45),
    ("select_cycle", 48),
    ("excel_generation", 50),
    ("file_generation", 52),
    ("navigate_to_cart_adaptively", 60),
    ("cart_cleanup", 70),
    ("upload_order_file", 85),
    ("upload_validation", 92),
    ("completed", 100),
];

/// Look up the progress percentage for a step tag. Returns `None` for an
/// unrecognized tag so the caller can decide to keep its last known value.
#[must_use]
pub fn step_progress_percent(step: &str) -> Option<u8> {
    STEPS
        .iter()
        .find(|(name, _)| *name == step)
        .map(|(_, pct)| *pct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_steps_resolve() {
        assert_eq!(step_progress_percent("login"), Some(15));
        assert_eq!(step_progress_percent("completed"), Some(100));
    }

    #[test]
    fn aliases_resolve_to_same_percentage_as_canonical_name() {
        assert_eq!(
            step_progress_percent("impersonation"),
            step_progress_percent("select_otra_consultora")
        );
    }

    #[test]
    fn unknown_step_returns_none() {
        assert_eq!(step_progress_percent("not_a_real_step"), None);
    }

    #[test]
    fn percentages_are_non_decreasing_in_pipeline_order() {
        let canonical = [
            "starting",
            "preflight",
            "login",
            "impersonation",
            "search",
            "confirm",
            "select_cycle",
            "excel_generation",
            "file_generation",
            "navigate_to_cart_adaptively",
            "cart_cleanup",
            "upload_order_file",
            "upload_validation",
            "completed",
        ];
        let mut last = 0u8;
        for step in canonical {
            let pct = step_progress_percent(step).expect("known step");
            assert!(pct >= last, "{step} regressed progress");
            last = pct;
        }
    }
}
