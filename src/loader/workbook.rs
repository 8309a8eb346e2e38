use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use calamine::{Data, Reader, Sheets, open_workbook_auto_from_rs};

use super::unique_column_names;
use crate::core::DashError;

/// Largest magnitude at which a float still holds an exact integer.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

fn open(data: &[u8]) -> Result<Sheets<Cursor<&[u8]>>, DashError> {
    open_workbook_auto_from_rs(Cursor::new(data))
        .map_err(|e| DashError::ParseError(format!("cannot open workbook: {e}")))
}

pub(super) fn sheet_names(data: &[u8]) -> Result<Vec<String>, DashError> {
    Ok(open(data)?.sheet_names())
}

pub(super) fn read_sheet(data: &[u8], sheet: Option<&str>) -> Result<RecordBatch, DashError> {
    let mut workbook = open(data)?;
    let names = workbook.sheet_names();

    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|name| name.as_str() == wanted)
            .cloned()
            .ok_or_else(|| DashError::ParseError(format!("worksheet '{wanted}' not found")))?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| DashError::ParseError("workbook has no sheets".to_string()))?,
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| DashError::ParseError(format!("cannot read worksheet '{name}': {e}")))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(RecordBatch::new_empty(Arc::new(Schema::empty())));
    };
    let body: Vec<&[Data]> = rows.collect();

    let names = unique_column_names(header.iter().map(|cell| cell_text(cell).unwrap_or_default()));
    let mut fields = Vec::with_capacity(names.len());
    let mut columns = Vec::with_capacity(names.len());

    for (idx, name) in names.into_iter().enumerate() {
        let cells: Vec<&Data> = body
            .iter()
            .map(|row| row.get(idx).unwrap_or(&Data::Empty))
            .collect();
        let column = build_column(&cells);
        fields.push(Field::new(name, column.data_type().clone(), true));
        columns.push(column);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .map_err(|e| DashError::ParseError(e.to_string()))
}

fn is_blank(cell: &Data) -> bool {
    matches!(cell, Data::Empty | Data::Error(_))
}

fn as_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(i) => Some(*i as f64),
        Data::Float(f) => Some(*f),
        _ => None,
    }
}

/// Numeric columns become Int64 when every value is integral (the way
/// spreadsheet readers usually hand back whole numbers), otherwise Float64.
/// Booleans stay booleans; anything mixed falls back to text.
fn build_column(cells: &[&Data]) -> ArrayRef {
    let filled: Vec<&Data> = cells.iter().copied().filter(|c| !is_blank(c)).collect();

    if filled.is_empty() {
        return Arc::new(StringArray::new_null(cells.len()));
    }

    if filled.iter().all(|c| as_number(c).is_some()) {
        let integral = filled.iter().all(|c| match c {
            Data::Int(_) => true,
            Data::Float(f) => f.fract() == 0.0 && f.abs() <= MAX_EXACT_INT,
            _ => false,
        });
        if integral {
            let values: Int64Array = cells
                .iter()
                .map(|c| match c {
                    Data::Int(i) => Some(*i),
                    Data::Float(f) => Some(*f as i64),
                    _ => None,
                })
                .collect();
            return Arc::new(values);
        }
        let values: Float64Array = cells.iter().map(|c| as_number(c)).collect();
        return Arc::new(values);
    }

    if filled.iter().all(|c| matches!(c, Data::Bool(_))) {
        let values: BooleanArray = cells
            .iter()
            .map(|c| match c {
                Data::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        return Arc::new(values);
    }

    let values: StringArray = cells.iter().map(|c| cell_text(c)).collect();
    Arc::new(values)
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(match dt.as_datetime() {
            Some(datetime) if datetime.time() == chrono::NaiveTime::MIN => {
                datetime.date().format("%Y-%m-%d").to_string()
            }
            Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => cell.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::AsArray;
    use arrow::datatypes::{DataType, Float64Type, Int64Type};
    use rust_xlsxwriter::Workbook;

    use super::*;

    fn people_workbook() -> Vec<u8> {
        let mut workbook = Workbook::new();

        let sheet = workbook.add_worksheet();
        sheet.set_name("People").unwrap();
        sheet.write_string(0, 0, "name").unwrap();
        sheet.write_string(0, 1, "age").unwrap();
        sheet.write_string(0, 2, "height").unwrap();
        sheet.write_string(0, 3, "active").unwrap();
        sheet.write_string(1, 0, "alice").unwrap();
        sheet.write_number(1, 1, 31.0).unwrap();
        sheet.write_number(1, 2, 1.68).unwrap();
        sheet.write_boolean(1, 3, true).unwrap();
        sheet.write_string(2, 0, "bob").unwrap();
        sheet.write_number(2, 2, 1.82).unwrap();
        sheet.write_boolean(2, 3, false).unwrap();

        let other = workbook.add_worksheet();
        other.set_name("Codes").unwrap();
        other.write_string(0, 0, "code").unwrap();
        other.write_string(1, 0, "A1").unwrap();
        other.write_number(2, 0, 7.0).unwrap();

        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_sheet_names_in_order() {
        let data = people_workbook();
        assert_eq!(sheet_names(&data).unwrap(), vec!["People", "Codes"]);
    }

    #[test]
    fn test_read_first_sheet_by_default() {
        let data = people_workbook();
        let batch = read_sheet(&data, None).unwrap();

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 4);

        let schema = batch.schema();
        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(1).data_type(), &DataType::Int64);
        assert_eq!(schema.field(2).data_type(), &DataType::Float64);
        assert_eq!(schema.field(3).data_type(), &DataType::Boolean);

        let ages = batch.column(1).as_primitive::<Int64Type>();
        assert_eq!(ages.value(0), 31);
        assert!(ages.is_null(1));

        let heights = batch.column(2).as_primitive::<Float64Type>();
        assert_eq!(heights.value(1), 1.82);

        let active = batch.column(3).as_boolean();
        assert!(active.value(0));
        assert!(!active.value(1));
    }

    #[test]
    fn test_read_named_sheet_with_mixed_column() {
        let data = people_workbook();
        let batch = read_sheet(&data, Some("Codes")).unwrap();

        assert_eq!(batch.schema().field(0).data_type(), &DataType::Utf8);
        let codes = batch.column(0).as_string::<i32>();
        assert_eq!(codes.value(0), "A1");
        assert_eq!(codes.value(1), "7");
    }

    #[test]
    fn test_unknown_sheet() {
        let data = people_workbook();
        assert_eq!(
            read_sheet(&data, Some("Missing")),
            Err(DashError::ParseError(
                "worksheet 'Missing' not found".to_string()
            ))
        );
    }

    #[test]
    fn test_garbage_is_not_a_workbook() {
        let result = read_sheet(b"definitely not a zip archive", None);
        assert!(matches!(result, Err(DashError::ParseError(_))));
    }

    #[test]
    fn test_empty_sheet_has_no_columns() {
        let mut workbook = Workbook::new();
        workbook.add_worksheet();
        let data = workbook.save_to_buffer().unwrap();

        let batch = read_sheet(&data, None).unwrap();
        assert_eq!(batch.num_columns(), 0);
        assert_eq!(batch.num_rows(), 0);
    }
}
