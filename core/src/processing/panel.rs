use crate::math::{AkimaSpline, StatsHelper};
use crate::model::Surface;
use crate::prelude::{StageError, StageResult};

/// One flat segment between two consecutive resampled wing points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Panel {
    pub inclination: f64,
    pub area: f64,
    /// y-component of the surface normal: `-cos α` on top, `+cos α` below.
    pub normal_y: f64,
}

/// Resampled wing curve of one surface and its panels.
#[derive(Debug, Clone)]
pub struct SurfacePanels {
    pub surface: Surface,
    pub samples: Vec<(f64, f64)>,
    pub panels: Vec<Panel>,
}

impl SurfacePanels {
    pub fn build(
        surface: Surface,
        curve: &[(f64, f64)],
        points: usize,
        chord_length: f64,
        width: f64,
    ) -> StageResult<Self> {
        if points < 2 {
            return Err(StageError::Degenerate(format!(
                "{surface} wing needs at least two samples, got {points}"
            )));
        }
        let (xs, ys): (Vec<f64>, Vec<f64>) = curve.iter().copied().unzip();
        let spline = AkimaSpline::new(&xs, &ys).map_err(|err| {
            StageError::Degenerate(format!("{surface} wing curve: {err}"))
        })?;

        let sample_x = StatsHelper::linspace(xs[0], xs[xs.len() - 1], points);
        let sample_y = spline.evaluate_all(&sample_x);

        let scaled_x: Vec<f64> = sample_x.iter().map(|x| x * chord_length).collect();
        let delta_x = StatsHelper::diff(&scaled_x);
        let delta_y = StatsHelper::diff(&sample_y);

        let sign = match surface {
            Surface::Top => -1.0,
            Surface::Bottom => 1.0,
        };
        let panels = delta_x
            .iter()
            .zip(&delta_y)
            .enumerate()
            .map(|(index, (&dx, &dy))| {
                if dx == 0.0 || !dx.is_finite() {
                    return Err(StageError::Degenerate(format!(
                        "{surface} panel {index} has zero chordwise length"
                    )));
                }
                let inclination = (dy / dx).atan();
                let cos = inclination.cos();
                Ok(Panel {
                    inclination,
                    area: width * dx / cos,
                    normal_y: sign * cos,
                })
            })
            .collect::<StageResult<Vec<_>>>()?;

        Ok(Self {
            surface,
            samples: sample_x.into_iter().zip(sample_y).collect(),
            panels,
        })
    }

    /// Normal force of this surface. `pressure` is sampled on the shared grid;
    /// panel `i` takes the pressure at grid index `i + 1`.
    pub fn force(&self, pressure: &[f64]) -> StageResult<f64> {
        if pressure.len() != self.panels.len() + 1 {
            return Err(StageError::Degenerate(format!(
                "{} surface: {} pressures for {} panels",
                self.surface,
                pressure.len(),
                self.panels.len()
            )));
        }
        Ok(self
            .panels
            .iter()
            .zip(&pressure[1..])
            .map(|(panel, p)| p * panel.normal_y * panel.area)
            .sum())
    }
}
