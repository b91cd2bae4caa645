use std::sync::Arc;

use super::WindowCount;
use crate::model::Scorer;

/// Classifies windows with a loaded scoring artifact. The window's `count`
/// is the only feature.
#[derive(Clone)]
pub struct ModelClassifier {
    scorer: Arc<dyn Scorer>,
}

impl ModelClassifier {
    pub fn new(scorer: Arc<dyn Scorer>) -> Self {
        Self { scorer }
    }

    pub fn is_anomalous(&self, window: &WindowCount) -> bool {
        self.scorer.predict(window.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_delegates_to_scorer() {
        let classifier = ModelClassifier::new(Arc::new(|count: u64| count % 2 == 1));
        let mut window = WindowCount {
            identity: "10.0.0.5".into(),
            window_start: Utc::now(),
            count: 3,
        };
        assert!(classifier.is_anomalous(&window));
        window.count = 4;
        assert!(!classifier.is_anomalous(&window));
    }
}
