use super::WindowCount;

/// Requests per window above which a window is flagged.
pub const DEFAULT_THRESHOLD: u64 = 10;

/// Stateless rate rule: a window is anomalous when `count > threshold`.
#[derive(Debug, Clone, Copy)]
pub struct RuleClassifier {
    threshold: u64,
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl RuleClassifier {
    pub fn new(threshold: u64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn is_anomalous(&self, window: &WindowCount) -> bool {
        self.exceeds(window.count)
    }

    /// Strict inequality: a count equal to the threshold is normal.
    pub fn exceeds(&self, count: u64) -> bool {
        count > self.threshold
    }
}
