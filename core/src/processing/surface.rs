use crate::math::AkimaSpline;
use crate::model::{Configuration, Surface};
use crate::prelude::{StageError, StageResult, TAP_COUNT};

/// Below this the trailing edge gets a synthetic anchor at x = 1.
pub const TRAILING_EDGE_LIMIT: f64 = 0.99;
/// Above this the leading edge gets a synthetic anchor (0, 0).
pub const LEADING_EDGE_EPSILON: f64 = 1e-5;

/// Sorted (coordinate, pressure) knots of one surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceKnots {
    pub surface: Surface,
    pub x: Vec<f64>,
    pub pressure: Vec<f64>,
}

impl SurfaceKnots {
    /// Picks the surface's active taps and sorts them by coordinate, ties
    /// broken by pressure.
    pub fn select(config: &Configuration, surface: Surface, pressure: &[f64; TAP_COUNT]) -> Self {
        let mut pairs: Vec<(f64, f64)> = config
            .mask(surface)
            .indices()
            .map(|tap| (config.tap_coordinates[tap], pressure[tap]))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        let (x, pressure) = pairs.into_iter().unzip();
        Self {
            surface,
            x,
            pressure,
        }
    }

    /// Adds anchors so the knots cover the whole chord.
    pub fn extend_to_edges(&mut self) -> StageResult<()> {
        let count = self.x.len();
        if count < 2 {
            return Err(StageError::Degenerate(format!(
                "{} surface has {} active taps",
                self.surface, count
            )));
        }

        let (x_prev, x_last) = (self.x[count - 2], self.x[count - 1]);
        if x_last < TRAILING_EDGE_LIMIT {
            let gap = x_last - x_prev;
            if gap == 0.0 {
                return Err(StageError::Degenerate(format!(
                    "{} surface has two taps at x = {}",
                    self.surface, x_last
                )));
            }
            let (p_prev, p_last) = (self.pressure[count - 2], self.pressure[count - 1]);
            let trailing = p_prev + (p_last - p_prev) / gap * (1.0 - x_prev);
            self.x.push(1.0);
            self.pressure.push(trailing);
        }

        if self.x[0] > LEADING_EDGE_EPSILON {
            self.x.insert(0, 0.0);
            self.pressure.insert(0, 0.0);
        }
        Ok(())
    }

    pub fn spline(&self) -> StageResult<AkimaSpline> {
        AkimaSpline::new(&self.x, &self.pressure).map_err(|err| match err {
            StageError::Degenerate(reason) => {
                StageError::Degenerate(format!("{} surface: {}", self.surface, reason))
            }
            other => other,
        })
    }
}
