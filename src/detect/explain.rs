use super::WindowCount;

/// Operator-facing explanation for a model-flagged window.
pub fn explain(window: &WindowCount) -> String {
    format!(
        "IP {} generated {} requests in one minute, exceeding normal limits. \
         This indicates possible brute-force, bot activity, or API abuse.",
        window.identity, window.count
    )
}
