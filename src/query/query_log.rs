use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{SecondsFormat, Utc};

use crate::core::DashError;

/// Append-only record of failed queries, shared by every session.
pub struct QueryLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl QueryLog {
    /// Opens the log, discarding whatever a previous run left behind.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, DashError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| {
            DashError::IoError(format!("creating query log {}: {}", path.display(), e))
        })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_failure(&self, query: &str, message: &str) -> Result<(), DashError> {
        let line = format!(
            "{} ERROR Query failed: {}. Error: {}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            query,
            message
        );
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn contents(&self) -> Result<String, DashError> {
        Ok(std::fs::read_to_string(&self.path)?)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_failures_are_appended() {
        let dir = TempDir::new().unwrap();
        let log = QueryLog::create(dir.path().join("query.log")).unwrap();

        log.record_failure("SELEC 1", "syntax error").unwrap();
        log.record_failure("SELECT x FROM data", "no such column: x").unwrap();

        let contents = log.contents().unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("ERROR Query failed: SELEC 1. Error: syntax error"));
        assert!(lines[1].contains("no such column: x"));
    }

    #[test]
    fn test_create_truncates_previous_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("query.log");
        std::fs::write(&path, "stale entry\n").unwrap();

        let log = QueryLog::create(&path).unwrap();
        assert_eq!(log.contents().unwrap(), "");
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let result = QueryLog::create(dir.path().join("missing").join("query.log"));
        assert!(matches!(result, Err(DashError::IoError(_))));
    }
}
