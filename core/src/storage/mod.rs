//! Append-only measurement log.

mod csv_log;

pub use csv_log::{default_log_path, CsvLog};
