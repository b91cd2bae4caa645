use crate::detect::DetectionEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: DetectionEngine,
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(engine: DetectionEngine) -> Self {
        Self {
            engine,
            trust_forwarded_for: false,
        }
    }
}
