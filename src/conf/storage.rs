use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where exports and the failed-query log are written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "StorageConfig::default_export_dir")]
    pub export_dir: PathBuf,
    #[serde(default = "StorageConfig::default_query_log")]
    pub query_log: PathBuf,
}

impl StorageConfig {
    fn default_export_dir() -> PathBuf {
        PathBuf::from(".")
    }

    fn default_query_log() -> PathBuf {
        PathBuf::from("migration.log")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            export_dir: Self::default_export_dir(),
            query_log: Self::default_query_log(),
        }
    }
}
