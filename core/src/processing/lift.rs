use crate::math::StatsHelper;
use crate::model::{CalculationResult, Configuration, Reading, Surface};
use crate::prelude::{ProcessingStage, StageError, StageResult};
use crate::processing::panel::SurfacePanels;
use crate::processing::surface::SurfaceKnots;
use crate::telemetry::log::LogManager;

/// Geometry derived from a configuration; rebuilt only when it changes.
struct StageGeometry {
    config: Configuration,
    grid: Vec<f64>,
    top: SurfacePanels,
    bottom: SurfacePanels,
}

/// Spline fit plus panel integration of one reading.
pub struct LiftStage {
    geometry: Option<StageGeometry>,
    logger: LogManager,
}

impl LiftStage {
    pub fn new() -> Self {
        Self {
            geometry: None,
            logger: LogManager::new("calculation"),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.geometry.is_some()
    }
}

impl Default for LiftStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for LiftStage {
    fn initialize(&mut self, config: &Configuration) -> StageResult<()> {
        self.geometry = None;
        config.validate()?;

        let points = config.interpolation_points;
        let build = |surface: Surface| {
            SurfacePanels::build(
                surface,
                config.wing.surface(surface),
                points,
                config.chord_length,
                config.flow.width,
            )
        };
        let top = build(Surface::Top)?;
        let bottom = build(Surface::Bottom)?;

        self.geometry = Some(StageGeometry {
            config: config.clone(),
            grid: StatsHelper::linspace(0.0, 1.0, points),
            top,
            bottom,
        });
        self.logger.detail(&format!(
            "lift stage ready: {} grid points, profile {}",
            points, config.wing.name
        ));
        Ok(())
    }

    fn execute(&mut self, input: &Reading) -> StageResult<CalculationResult> {
        let geometry = self.geometry.as_ref().ok_or(StageError::NotInitialized)?;
        let config = &geometry.config;

        let mut top = SurfaceKnots::select(config, Surface::Top, &input.pressure);
        let mut bottom = SurfaceKnots::select(config, Surface::Bottom, &input.pressure);
        top.extend_to_edges()?;
        bottom.extend_to_edges()?;

        let spline_top = top.spline()?.evaluate_all(&geometry.grid);
        let spline_bottom = bottom.spline()?.evaluate_all(&geometry.grid);

        let normal_force = geometry.top.force(&spline_top)? + geometry.bottom.force(&spline_bottom)?;
        let lift = normal_force * config.flow.angle_of_attack_deg.to_radians().cos();
        if !lift.is_finite() {
            return Err(StageError::Degenerate(format!(
                "lift of reading {} is not finite",
                input.sequence
            )));
        }

        Ok(CalculationResult {
            sequence: input.sequence,
            lift,
            spline_top,
            spline_bottom,
            interpolation_grid: geometry.grid.clone(),
            wing_sample_top: geometry.top.samples.clone(),
            wing_sample_bottom: geometry.bottom.samples.clone(),
            valid: true,
        })
    }

    fn cleanup(&mut self) {
        self.geometry = None;
    }
}
