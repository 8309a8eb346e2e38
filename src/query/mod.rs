//! Ad-hoc SQL over the current table.
//!
//! Every query gets its own in-memory SQLite database: the table is copied in
//! under the name [`TABLE_NAME`], the query runs, and the database is dropped.
//! Nothing survives between queries.

mod query_log;
mod store;

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use log::{error, warn};

use crate::conf::QueryConfig;
use crate::core::DashError;

pub use query_log::QueryLog;
pub use store::TABLE_NAME;

use store::EphemeralStore;

pub struct QueryEngine {
    config: QueryConfig,
    log: Arc<QueryLog>,
}

impl QueryEngine {
    pub fn new(config: QueryConfig, log: Arc<QueryLog>) -> Self {
        Self { config, log }
    }

    pub fn log(&self) -> &QueryLog {
        &self.log
    }

    /// Runs `sql` against a snapshot of `batch`. Engine failures come back as
    /// [`DashError::QueryError`] and are appended to the query log.
    pub fn execute(&self, batch: &RecordBatch, sql: &str) -> Result<RecordBatch, DashError> {
        let result = self.run(batch, sql);

        if let Err(DashError::QueryError { query, message }) = &result {
            error!("Query failed: {query}. Error: {message}");
            if let Err(e) = self.log.record_failure(query, message) {
                warn!("cannot write to query log {}: {}", self.log.path().display(), e);
            }
        }
        result
    }

    fn run(&self, batch: &RecordBatch, sql: &str) -> Result<RecordBatch, DashError> {
        if sql.trim().is_empty() {
            return Err(DashError::query(sql, "query is empty"));
        }

        let mut store = EphemeralStore::open().map_err(|e| DashError::query(sql, e))?;
        store.load(batch).map_err(|e| DashError::query(sql, e))?;
        store
            .query(sql, self.config.read_only)
            .map_err(|e| DashError::query(sql, e))
    }
}
