//! Turns uploaded files into tables.
//!
//! CSV files are parsed with the Arrow CSV reader using schema inference;
//! workbooks are read with calamine, one sheet at a time. Parsed tables are
//! memoized per upload identity in a [`LoaderCache`].

mod cache;
mod csv;
mod workbook;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;

use crate::core::DashError;

pub use cache::{CacheKey, LoaderCache};

static NEXT_UPLOAD_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Workbook,
}

impl FileKind {
    /// Detects the file kind from the extension of an uploaded file name.
    pub fn from_name(name: &str) -> Result<Self, DashError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(FileKind::Csv),
            Some("xlsx" | "xls" | "xlsm" | "xlsb" | "ods") => Ok(FileKind::Workbook),
            Some(ext) => Err(DashError::ParseError(format!(
                "unsupported file extension: {ext}"
            ))),
            None => Err(DashError::ParseError(format!(
                "file '{name}' has no extension"
            ))),
        }
    }
}

/// An uploaded file. `id` is the cache identity: every upload gets a fresh one,
/// even when the same bytes are uploaded twice.
#[derive(Debug, Clone)]
pub struct Upload {
    id: u64,
    name: String,
    kind: FileKind,
    data: Bytes,
}

impl Upload {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Result<Self, DashError> {
        let name = name.into();
        let kind = FileKind::from_name(&name)?;
        Ok(Self {
            id: NEXT_UPLOAD_ID.fetch_add(1, Ordering::Relaxed),
            name,
            kind,
            data: data.into(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

/// Sheet names of a workbook, in workbook order. CSV files have none.
pub fn sheet_names(upload: &Upload) -> Result<Vec<String>, DashError> {
    match upload.kind {
        FileKind::Csv => Ok(Vec::new()),
        FileKind::Workbook => workbook::sheet_names(&upload.data),
    }
}

/// Parses an upload into a table. `sheet` picks a workbook sheet by name; `None`
/// means the first sheet. CSV uploads ignore it.
pub fn load(upload: &Upload, sheet: Option<&str>) -> Result<RecordBatch, DashError> {
    match upload.kind {
        FileKind::Csv => csv::read_csv(&upload.data),
        FileKind::Workbook => workbook::read_sheet(&upload.data, sheet),
    }
}

/// Blank header cells become `Unnamed: <index>` and repeated names get a
/// `.1`, `.2`, ... suffix, so every column can be addressed in SQL.
pub(crate) fn unique_column_names<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: AHashMap<String, usize> = AHashMap::new();
    let mut names = Vec::new();

    for (idx, name) in raw.into_iter().enumerate() {
        let trimmed = name.as_ref().trim();
        let base = if trimmed.is_empty() {
            format!("Unnamed: {idx}")
        } else {
            trimmed.to_string()
        };

        let mut candidate = base.clone();
        if let Some(&last) = seen.get(&base) {
            let mut suffix = last;
            loop {
                suffix += 1;
                candidate = format!("{base}.{suffix}");
                if !seen.contains_key(&candidate) {
                    break;
                }
            }
            seen.insert(base, suffix);
        }
        seen.insert(candidate.clone(), 0);
        names.push(candidate);
    }
    names
}
