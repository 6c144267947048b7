use crate::model::{CalculationResult, Configuration, Reading, Surface};
use std::io;

/// Number of physical taps on the pressure scanner.
pub const TAP_COUNT: usize = 16;
/// Values returned per query by the pressure scanner.
pub const PRESSURE_ARITY: usize = TAP_COUNT;
/// Values returned per query by the ambient/density sensor.
pub const ENVIRONMENT_ARITY: usize = 4;

/// Failure while talking to an instrument.
#[derive(thiserror::Error, Debug)]
pub enum DeviceError {
    #[error("cannot connect to {device}: {source}")]
    Connection {
        device: String,
        #[source]
        source: io::Error,
    },
    #[error("{device}: {error}")]
    Protocol {
        device: String,
        #[source]
        error: ProtocolError,
    },
    #[error("{0} is closed")]
    Closed(String),
}

impl DeviceError {
    pub fn is_connection(&self) -> bool {
        matches!(self, DeviceError::Connection { .. })
    }
}

/// Malformed or wrong-arity answer to a query.
#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("expected {expected} values, received {received}")]
    ShapeMismatch { expected: usize, received: usize },
    #[error("token {token:?} is not a number")]
    Malformed { token: String },
    #[error("transport failure: {0}")]
    Io(#[from] io::Error),
}

/// Rejected setup or flow update. Never reaches the running pipeline.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("{surface} surface needs at least two active taps, found {count}")]
    InsufficientTaps { surface: Surface, count: usize },
    #[error("{surface} surface has more than one active tap at x = {coordinate}")]
    DuplicateCoordinate { surface: Surface, coordinate: f64 },
    #[error("tap {tap} coordinate {coordinate} is outside [0, 1]")]
    CoordinateOutOfRange { tap: usize, coordinate: f64 },
    #[error("tap {tap} is assigned to both surfaces")]
    OverlappingMasks { tap: usize },
    #[error("invalid wing geometry: {0}")]
    InvalidWing(String),
    #[error("interpolation grid needs at least two points, got {0}")]
    InvalidGrid(usize),
    #[error("invalid flow conditions: {0}")]
    InvalidFlow(String),
}

/// Error type for stage execution.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("stage not initialized")]
    NotInitialized,
    #[error("degenerate calculation: {0}")]
    Degenerate(String),
    #[error("configuration rejected: {0}")]
    Configuration(#[from] ConfigurationError),
}

pub type StageResult<T> = Result<T, StageError>;

/// Failure while appending to the measurement log.
#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error("log file i/o: {0}")]
    Io(#[from] io::Error),
    #[error("log file csv: {0}")]
    Csv(#[from] csv::Error),
}

/// Failure while reading an airfoil `.dat` file.
#[derive(thiserror::Error, Debug)]
pub enum ProfileError {
    #[error("reading profile: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("{0} surface x-coordinates are not strictly increasing")]
    NotIncreasing(Surface),
    #[error("profile contains no coordinates")]
    Empty,
}

/// A calculation stage driven once per published reading.
pub trait ProcessingStage {
    fn initialize(&mut self, config: &Configuration) -> StageResult<()>;
    fn execute(&mut self, input: &Reading) -> StageResult<CalculationResult>;
    fn cleanup(&mut self);
}
