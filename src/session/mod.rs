//! Per-session dashboard state. Each user action is one method call on a
//! [`Session`]; the table only ever flows downward from the loaded upload
//! through preprocessing into queries and exports.

use std::collections::BTreeSet;

use arrow::array::UInt64Array;
use arrow::compute::take_record_batch;
use arrow::record_batch::RecordBatch;
use log::info;
use serde::Serialize;

use crate::core::DashError;
use crate::export::{ExportFormat, ExportReport, Exporter};
use crate::loader::{FileKind, LoaderCache, Upload, sheet_names};
use crate::preprocess::{Policy, apply};
use crate::query::QueryEngine;

pub const DEFAULT_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Empty,
    Loaded,
    Preprocessed,
    Queried,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub stage: Stage,
    pub file: Option<String>,
    pub sheets: Vec<String>,
    pub sheet: Option<String>,
    pub policy: Policy,
    pub num_rows: usize,
    pub columns: Vec<ColumnSummary>,
    pub selected_rows: usize,
    pub has_query_result: bool,
    pub last_export: Option<ExportReport>,
}

/// Everything derived from one successful upload.
struct Loaded {
    upload: Upload,
    sheets: Vec<String>,
    sheet: Option<String>,
    table: RecordBatch,
    current: RecordBatch,
}

#[derive(Default)]
pub struct Session {
    loaded: Option<Loaded>,
    policy: Policy,
    selection: BTreeSet<usize>,
    query_result: Option<RecordBatch>,
    last_export: Option<ExportReport>,
    closed: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn loaded(&self) -> Result<&Loaded, DashError> {
        self.loaded
            .as_ref()
            .ok_or_else(|| DashError::NoData("no file has been uploaded".to_string()))
    }

    pub fn stage(&self) -> Stage {
        match (&self.loaded, &self.query_result, &self.policy) {
            (None, _, _) => Stage::Empty,
            (Some(_), Some(_), _) => Stage::Queried,
            (Some(_), None, Policy::None) => Stage::Loaded,
            (Some(_), None, _) => Stage::Preprocessed,
        }
    }

    /// Marks the session as ended and releases its data. Returns the upload
    /// whose cached tables should be invalidated.
    pub fn close(&mut self) -> Option<u64> {
        self.closed = true;
        self.reset_derived();
        self.loaded.take().map(|l| l.upload.id())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The id of the current upload, if any.
    pub fn upload_id(&self) -> Option<u64> {
        self.loaded.as_ref().map(|l| l.upload.id())
    }

    /// Replaces the session's data with a new upload. Workbooks open on their
    /// first sheet. On failure the session keeps its previous data.
    pub fn upload(&mut self, upload: Upload, cache: &LoaderCache) -> Result<(), DashError> {
        let sheets = sheet_names(&upload)?;
        let sheet = match upload.kind() {
            FileKind::Csv => None,
            FileKind::Workbook => Some(
                sheets
                    .first()
                    .cloned()
                    .ok_or_else(|| DashError::ParseError("workbook has no sheets".to_string()))?,
            ),
        };
        let table = cache.get_or_load(&upload, sheet.as_deref())?;

        info!(
            "loaded '{}' ({} rows, {} columns)",
            upload.name(),
            table.num_rows(),
            table.num_columns()
        );

        if let Some(previous) = self.loaded.take() {
            cache.invalidate(previous.upload.id());
        }
        self.policy = Policy::None;
        self.loaded = Some(Loaded {
            upload,
            sheets,
            sheet,
            current: table.clone(),
            table,
        });
        self.reset_derived();
        Ok(())
    }

    pub fn select_sheet(&mut self, sheet: &str, cache: &LoaderCache) -> Result<(), DashError> {
        let loaded = self.loaded()?;
        if loaded.upload.kind() != FileKind::Workbook {
            return Err(DashError::InvalidRequest(format!(
                "'{}' is not a workbook",
                loaded.upload.name()
            )));
        }

        let table = cache.get_or_load(&loaded.upload, Some(sheet))?;
        let current = apply(&table, &self.policy)?;

        if let Some(loaded) = self.loaded.as_mut() {
            loaded.sheet = Some(sheet.to_string());
            loaded.table = table;
            loaded.current = current;
        }
        self.reset_derived();
        Ok(())
    }

    /// Re-derives the current table from the loaded one.
    pub fn set_policy(&mut self, policy: Policy) -> Result<(), DashError> {
        let current = apply(&self.loaded()?.table, &policy)?;
        if let Some(loaded) = self.loaded.as_mut() {
            loaded.current = current;
        }
        self.policy = policy;
        self.reset_derived();
        Ok(())
    }

    fn reset_derived(&mut self) {
        self.selection.clear();
        self.query_result = None;
    }

    /// The full post-preprocessing table.
    pub fn table(&self) -> Result<&RecordBatch, DashError> {
        Ok(&self.loaded()?.current)
    }

    pub fn preview(&self, limit: usize) -> Result<RecordBatch, DashError> {
        let table = self.table()?;
        Ok(table.slice(0, limit.min(table.num_rows())))
    }

    /// Replaces the selection and returns the selected rows in row order.
    pub fn select_rows(&mut self, rows: &[usize]) -> Result<RecordBatch, DashError> {
        let num_rows = self.table()?.num_rows();
        if let Some(bad) = rows.iter().find(|&&row| row >= num_rows) {
            return Err(DashError::InvalidRequest(format!(
                "row {bad} is out of range (table has {num_rows} rows)"
            )));
        }
        self.selection = rows.iter().copied().collect();
        self.selected()
    }

    pub fn selection(&self) -> &BTreeSet<usize> {
        &self.selection
    }

    pub fn selected(&self) -> Result<RecordBatch, DashError> {
        let indices = UInt64Array::from_iter_values(self.selection.iter().map(|&row| row as u64));
        Ok(take_record_batch(self.table()?, &indices)?)
    }

    /// Runs a query on the current table. A failure drops any earlier result
    /// and leaves the current table untouched.
    pub fn run_query(&mut self, sql: &str, engine: &QueryEngine) -> Result<RecordBatch, DashError> {
        self.query_result = None;
        let result = engine.execute(self.table()?, sql)?;
        self.query_result = Some(result.clone());
        Ok(result)
    }

    pub fn query_result(&self) -> Option<&RecordBatch> {
        self.query_result.as_ref()
    }

    pub fn export(&mut self, format: ExportFormat, exporter: &Exporter) -> Result<ExportReport, DashError> {
        let report = exporter.export(self.table()?, format)?;
        self.last_export = Some(report.clone());
        Ok(report)
    }

    pub fn summary(&self) -> SessionSummary {
        let loaded = self.loaded.as_ref();
        let columns = loaded
            .map(|l| {
                l.current
                    .schema()
                    .fields()
                    .iter()
                    .map(|f| ColumnSummary {
                        name: f.name().clone(),
                        dtype: f.data_type().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        SessionSummary {
            stage: self.stage(),
            file: loaded.map(|l| l.upload.name().to_string()),
            sheets: loaded.map(|l| l.sheets.clone()).unwrap_or_default(),
            sheet: loaded.and_then(|l| l.sheet.clone()),
            policy: self.policy.clone(),
            num_rows: loaded.map_or(0, |l| l.current.num_rows()),
            columns,
            selected_rows: self.selection.len(),
            has_query_result: self.query_result.is_some(),
            last_export: self.last_export.clone(),
        }
    }
}
