pub mod config;
pub mod reading;
pub mod record;
pub mod result;
pub mod setup;

pub use config::{Configuration, FlowConditions, Surface, TapMask, WingProfile};
pub use reading::{Environment, Reading};
pub use record::PersistedRecord;
pub use result::CalculationResult;
pub use setup::{SetupInput, TapLayout};
