use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use log::info;
use tokio::sync::{Mutex, RwLock};

use crate::conf::Config;
use crate::core::DashError;
use crate::export::{ExportFormat, ExportReport, Exporter};
use crate::loader::{LoaderCache, Upload};
use crate::preprocess::Policy;
use crate::query::{QueryEngine, QueryLog};
use crate::session::{Session, SessionSummary};

/// Process-wide collaborators handed to every session operation.
#[derive(Clone)]
struct Shared {
    cache: Arc<LoaderCache>,
    engine: Arc<QueryEngine>,
    exporter: Arc<Exporter>,
}

pub struct DashService {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    next_id: AtomicU64,
    shared: Shared,
    config: Config,
}

impl DashService {
    /// Builds the service and truncates the query log.
    pub fn new(config: Config) -> Result<Self, DashError> {
        let log = QueryLog::create(&config.storage.query_log)?;
        info!("query log at {}", log.path().display());

        let shared = Shared {
            cache: Arc::new(LoaderCache::new()),
            engine: Arc::new(QueryEngine::new(config.query.clone(), Arc::new(log))),
            exporter: Arc::new(Exporter::new(config.storage.export_dir.clone())),
        };

        Ok(Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            shared,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &LoaderCache {
        &self.shared.cache
    }

    pub fn query_log(&self) -> &QueryLog {
        self.shared.engine.log()
    }

    pub async fn create_session(&self) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(Session::new())));
        info!("session {id} created");
        id
    }

    /// Drops a session together with its cached tables.
    pub async fn delete_session(&self, id: &str) -> Result<(), DashError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| DashError::SessionNotFound(id.to_string()))?;

        if let Some(upload_id) = session.lock().await.close() {
            self.shared.cache.invalidate(upload_id);
        }
        info!("session {id} deleted");
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn session(&self, id: &str) -> Result<Arc<Mutex<Session>>, DashError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DashError::SessionNotFound(id.to_string()))
    }

    async fn with_session<T, F>(&self, id: &str, op: F) -> Result<T, DashError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session, &Shared) -> Result<T, DashError> + Send + 'static,
    {
        let session = self.session(id).await?;
        self.run_locked(id, session, op).await
    }

    /// Runs `op` on the blocking pool while holding the session's lock, so
    /// operations on one session never interleave. A session deleted while
    /// `op` waited for the lock is reported as not found.
    async fn run_locked<T, F>(
        &self,
        id: &str,
        session: Arc<Mutex<Session>>,
        op: F,
    ) -> Result<T, DashError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session, &Shared) -> Result<T, DashError> + Send + 'static,
    {
        let shared = self.shared.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let mut session = session.blocking_lock();
            if session.is_closed() {
                return Err(DashError::SessionNotFound(id));
            }
            op(&mut session, &shared)
        })
        .await
        .map_err(|e| DashError::Internal(format!("session task failed: {e}")))?
    }

    pub async fn summary(&self, id: &str) -> Result<SessionSummary, DashError> {
        let session = self.session(id).await?;
        let summary = session.lock().await.summary();
        Ok(summary)
    }

    pub async fn upload(&self, id: &str, name: &str, data: Bytes) -> Result<SessionSummary, DashError> {
        let upload = Upload::new(name, data)?;
        self.with_session(id, move |session, shared| {
            session.upload(upload, &shared.cache)?;
            Ok(session.summary())
        })
        .await
    }

    pub async fn select_sheet(&self, id: &str, sheet: String) -> Result<SessionSummary, DashError> {
        self.with_session(id, move |session, shared| {
            session.select_sheet(&sheet, &shared.cache)?;
            Ok(session.summary())
        })
        .await
    }

    pub async fn set_policy(&self, id: &str, policy: Policy) -> Result<SessionSummary, DashError> {
        self.with_session(id, move |session, _| {
            session.set_policy(policy)?;
            Ok(session.summary())
        })
        .await
    }

    /// The current table, cut to `limit` rows when given.
    pub async fn table(&self, id: &str, limit: Option<usize>) -> Result<RecordBatch, DashError> {
        self.with_session(id, move |session, _| match limit {
            Some(limit) => session.preview(limit),
            None => session.table().cloned(),
        })
        .await
    }

    pub async fn preview(&self, id: &str, limit: usize) -> Result<RecordBatch, DashError> {
        self.with_session(id, move |session, _| session.preview(limit))
            .await
    }

    pub async fn select_rows(&self, id: &str, rows: Vec<usize>) -> Result<RecordBatch, DashError> {
        self.with_session(id, move |session, _| session.select_rows(&rows))
            .await
    }

    pub async fn run_query(&self, id: &str, sql: String) -> Result<RecordBatch, DashError> {
        self.with_session(id, move |session, shared| {
            session.run_query(&sql, &shared.engine)
        })
        .await
    }

    pub async fn export(&self, id: &str, format: ExportFormat) -> Result<ExportReport, DashError> {
        self.with_session(id, move |session, shared| {
            session.export(format, &shared.exporter)
        })
        .await
    }
}
