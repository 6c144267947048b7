//! The three concurrent tasks and the channels that connect them.
//!
//! Acquisition publishes readings, calculation turns each reading into a
//! result, presentation samples both on its own timer. The broadcaster is the
//! only writer of the configuration.

pub mod acquisition;
pub mod broadcast;
pub mod calculation;
pub mod channel;
pub mod presentation;

pub use acquisition::{
    AcquisitionCommand, AcquisitionExit, AcquisitionHandle, AcquisitionLinks,
    AcquisitionSettings, AcquisitionState, AcquisitionTask,
};
pub use broadcast::ConfigurationBroadcaster;
pub use calculation::CalculationTask;
pub use channel::{Notice, NoticeLevel, Publisher, Subscription};
pub use presentation::{
    render, Color, DisplayControl, DisplayMode, DisplayOptions, Frame, FrameInputs, FrameSink,
    PresentationLinks, PresentationSettings, PresentationTask, SplineOverlay, TapPoint,
};
