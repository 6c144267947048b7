use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Per-task cycle counters, shared between a task and its observers.
pub struct MetricsRecorder {
    inner: Mutex<CycleCounts>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCounts {
    pub processed: usize,
    pub errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CycleCounts::default()),
        }
    }

    pub fn record_processed(&self) {
        if let Ok(mut counts) = self.inner.lock() {
            counts.processed += 1;
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut counts) = self.inner.lock() {
            counts.errors += 1;
        }
    }

    pub fn snapshot(&self) -> CycleCounts {
        self.inner
            .lock()
            .map(|counts| *counts)
            .unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
