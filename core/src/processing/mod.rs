pub mod lift;
pub mod panel;
pub mod surface;

pub use lift::LiftStage;
pub use panel::{Panel, SurfacePanels};
pub use surface::SurfaceKnots;
