use serde::{Deserialize, Serialize};

/// Output of one calculation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    /// Sequence number of the reading this result was computed from.
    pub sequence: u64,
    pub lift: f64,
    pub spline_top: Vec<f64>,
    pub spline_bottom: Vec<f64>,
    pub interpolation_grid: Vec<f64>,
    pub wing_sample_top: Vec<(f64, f64)>,
    pub wing_sample_bottom: Vec<(f64, f64)>,
    pub valid: bool,
}

impl CalculationResult {
    /// Placeholder used before the first successful run.
    pub fn pending() -> Self {
        Self {
            sequence: 0,
            lift: 0.0,
            spline_top: Vec::new(),
            spline_bottom: Vec::new(),
            interpolation_grid: Vec::new(),
            wing_sample_top: Vec::new(),
            wing_sample_bottom: Vec::new(),
            valid: false,
        }
    }
}

impl Default for CalculationResult {
    fn default() -> Self {
        Self::pending()
    }
}
