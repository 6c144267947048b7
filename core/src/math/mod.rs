pub mod akima;
pub mod matrix;
pub mod stats;

pub use akima::AkimaSpline;
pub use matrix::MatrixHelper;
pub use stats::StatsHelper;
