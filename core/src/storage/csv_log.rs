use crate::model::PersistedRecord;
use crate::prelude::PersistenceError;
use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// `data/<yy-mm-dd_HH-MM-SS>.csv` under `root`, stamped with the session start.
pub fn default_log_path(root: &Path, started: DateTime<Local>) -> PathBuf {
    root.join(format!("{}.csv", started.format("%y-%m-%d_%H-%M-%S")))
}

/// CSV file that gains one row per saved measurement.
///
/// The header is written only when the file is created; later appends leave
/// existing rows untouched.
#[derive(Debug, Clone)]
pub struct CsvLog {
    path: PathBuf,
}

impl CsvLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &PersistedRecord) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let is_new = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(PersistedRecord::header())?;
        }
        writer.write_record(record.to_fields())?;
        writer.flush()?;
        log::info!("appended measurement to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::tests::sample_configuration;
    use crate::model::Environment;
    use crate::prelude::TAP_COUNT;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn record(lift: f64) -> PersistedRecord {
        PersistedRecord::from_means(
            "10:15:00".into(),
            &sample_configuration(),
            Environment::from_values([20.0, 40.0, 101_300.0, 1.204]),
            [-100.0; TAP_COUNT],
            lift,
            10,
            1.0,
        )
    }

    fn rows(path: &Path) -> Vec<csv::StringRecord> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap()
            .records()
            .map(Result::unwrap)
            .collect()
    }

    #[test]
    fn new_file_gets_header_and_one_row() {
        let dir = tempdir().unwrap();
        let log = CsvLog::new(dir.path().join("data").join("run.csv"));
        log.append(&record(1.5)).unwrap();

        let rows = rows(log.path());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].iter().collect::<Vec<_>>(), PersistedRecord::header());
        assert_eq!(&rows[1][7], "1.5");
    }

    #[test]
    fn appends_keep_header_and_existing_rows() {
        let dir = tempdir().unwrap();
        let log = CsvLog::new(dir.path().join("run.csv"));
        for lift in [1.0, 2.0, 3.0] {
            log.append(&record(lift)).unwrap();
        }

        let rows = rows(log.path());
        assert_eq!(rows.len(), 4);
        assert_eq!(&rows[0][0], "time");
        let lifts: Vec<&str> = rows[1..].iter().map(|row| &row[7]).collect();
        assert_eq!(lifts, vec!["1", "2", "3"]);
    }

    #[test]
    fn default_path_uses_session_start() {
        let started = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let path = default_log_path(Path::new("data"), started);
        assert_eq!(path, Path::new("data").join("24-03-09_14-05-07.csv"));
    }
}
