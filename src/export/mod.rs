//! Writes the current table to a fixed, well-known file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::csv::WriterBuilder;
use arrow::datatypes::{DataType, Float64Type};
use arrow::record_batch::RecordBatch;
use log::info;
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::{Deserialize, Serialize};

use crate::core::DashError;

const EXPORT_STEM: &str = "exported_data";
const SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    #[serde(alias = "xlsx", alias = "spreadsheet")]
    Excel,
}

impl ExportFormat {
    pub fn file_name(&self) -> String {
        match self {
            ExportFormat::Csv => format!("{EXPORT_STEM}.csv"),
            ExportFormat::Excel => format!("{EXPORT_STEM}.xlsx"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportReport {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub rows: usize,
}

pub struct Exporter {
    dir: PathBuf,
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, format: ExportFormat) -> PathBuf {
        self.dir.join(format.file_name())
    }

    /// Serializes `batch`, replacing any earlier export of the same format.
    pub fn export(&self, batch: &RecordBatch, format: ExportFormat) -> Result<ExportReport, DashError> {
        let path = self.path_for(format);
        match format {
            ExportFormat::Csv => write_csv(batch, &path)?,
            ExportFormat::Excel => write_xlsx(batch, &path)?,
        }

        info!(
            "exported {} rows to {}",
            batch.num_rows(),
            path.display()
        );
        Ok(ExportReport {
            path,
            format,
            rows: batch.num_rows(),
        })
    }
}

fn io_error(path: &Path, err: impl std::fmt::Display) -> DashError {
    DashError::IoError(format!("writing {}: {}", path.display(), err))
}

fn write_csv(batch: &RecordBatch, path: &Path) -> Result<(), DashError> {
    let file = File::create(path).map_err(|e| io_error(path, e))?;
    let mut writer = WriterBuilder::new()
        .with_header(true)
        .build(BufWriter::new(file));
    writer.write(batch).map_err(|e| io_error(path, e))?;
    writer
        .into_inner()
        .flush()
        .map_err(|e| io_error(path, e))
}

fn write_xlsx(batch: &RecordBatch, path: &Path) -> Result<(), DashError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let schema = batch.schema();
    for (idx, field) in schema.fields().iter().enumerate() {
        let col = u16::try_from(idx)
            .map_err(|_| io_error(path, format!("too many columns ({})", schema.fields().len())))?;
        sheet.write_string(0, col, field.name())?;
        write_column(sheet, col, batch.column(idx))?;
    }

    workbook.save(path).map_err(|e| io_error(path, e))
}

/// Numbers and booleans keep their cell type; everything else is written as
/// text. Nulls leave the cell empty.
fn write_column(sheet: &mut Worksheet, col: u16, array: &ArrayRef) -> Result<(), DashError> {
    match array.data_type() {
        DataType::Boolean => {
            for (idx, value) in array.as_boolean().iter().enumerate() {
                if let Some(value) = value {
                    sheet.write_boolean(sheet_row(idx)?, col, value)?;
                }
            }
        }
        dtype if dtype.is_numeric() => {
            let numbers = cast(array, &DataType::Float64)?;
            for (idx, value) in numbers.as_primitive::<Float64Type>().iter().enumerate() {
                if let Some(value) = value {
                    sheet.write_number(sheet_row(idx)?, col, value)?;
                }
            }
        }
        _ => {
            let text = cast(array, &DataType::Utf8)?;
            for (idx, value) in text.as_string::<i32>().iter().enumerate() {
                if let Some(value) = value {
                    sheet.write_string(sheet_row(idx)?, col, value)?;
                }
            }
        }
    }
    Ok(())
}

/// Data rows start below the header.
fn sheet_row(idx: usize) -> Result<u32, DashError> {
    u32::try_from(idx + 1)
        .map_err(|_| DashError::IoError(format!("row {idx} exceeds the worksheet limit")))
}
