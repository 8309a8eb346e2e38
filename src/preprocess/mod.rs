//! Missing-value handling applied to a loaded table before it is shown or queried.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Scalar, StringArray};
use arrow::compute::kernels::zip::zip;
use arrow::compute::{and, cast, filter_record_batch, is_not_null, is_null};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::core::DashError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "value", rename_all = "snake_case")]
pub enum Policy {
    #[default]
    None,
    /// Remove every row with a null in any column.
    DropRows,
    /// Replace every null cell with the given text.
    FillValue(String),
}

pub fn apply(batch: &RecordBatch, policy: &Policy) -> Result<RecordBatch, DashError> {
    match policy {
        Policy::None => Ok(batch.clone()),
        Policy::DropRows => drop_rows(batch),
        Policy::FillValue(value) => fill_value(batch, value),
    }
}

fn drop_rows(batch: &RecordBatch) -> Result<RecordBatch, DashError> {
    let mut keep: Option<BooleanArray> = None;

    for column in batch.columns() {
        if column.null_count() == 0 {
            continue;
        }
        let valid = is_not_null(column.as_ref())?;
        keep = Some(match keep {
            Some(acc) => and(&acc, &valid)?,
            None => valid,
        });
    }

    match keep {
        Some(mask) => Ok(filter_record_batch(batch, &mask)?),
        None => Ok(batch.clone()),
    }
}

fn fill_value(batch: &RecordBatch, value: &str) -> Result<RecordBatch, DashError> {
    let schema = batch.schema();
    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut columns = Vec::with_capacity(batch.num_columns());

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        let filled = fill_column(column, value)?;
        fields.push(Field::new(field.name(), filled.data_type().clone(), true));
        columns.push(filled);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Keeps the column type when `value` parses as it; otherwise the column is
/// rendered as text so the literal fits.
fn fill_column(column: &ArrayRef, value: &str) -> Result<ArrayRef, DashError> {
    if column.null_count() == 0 {
        return Ok(column.clone());
    }

    let literal: ArrayRef = Arc::new(StringArray::from(vec![value]));
    let target = column.data_type();

    let (column, literal) = if target == &DataType::Utf8 {
        (column.clone(), literal)
    } else {
        match cast(&literal, target).ok().filter(|typed| typed.is_valid(0)) {
            Some(typed) => (column.clone(), typed),
            None => (cast(column, &DataType::Utf8)?, literal),
        }
    };

    let mask = is_null(&column)?;
    Ok(zip(&mask, &Scalar::new(literal), &column)?)
}

#[cfg(test)]
mod tests {
    use arrow::array::{AsArray, Float64Array, Int64Array};
    use arrow::datatypes::{Float64Type, Int64Type};

    use super::*;

    fn batch_with_nulls() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("name", DataType::Utf8, true),
            Field::new("score", DataType::Float64, true),
        ]));
        let ids = Int64Array::from(vec![Some(1), Some(2), None, Some(4)]);
        let names = StringArray::from(vec![Some("a"), None, Some("c"), Some("d")]);
        let scores = Float64Array::from(vec![Some(0.5), Some(1.5), Some(2.5), Some(3.5)]);
        RecordBatch::try_new(schema, vec![Arc::new(ids), Arc::new(names), Arc::new(scores)])
            .unwrap()
    }

    fn null_cells(batch: &RecordBatch) -> usize {
        batch.columns().iter().map(|c| c.null_count()).sum()
    }

    #[test]
    fn test_none_is_identity() {
        let batch = batch_with_nulls();
        assert_eq!(apply(&batch, &Policy::None).unwrap(), batch);
    }

    #[test]
    fn test_drop_rows_removes_rows_with_nulls() {
        let batch = batch_with_nulls();
        let result = apply(&batch, &Policy::DropRows).unwrap();

        assert_eq!(result.num_rows(), 2);
        assert_eq!(null_cells(&result), 0);
        let ids = result.column(0).as_primitive::<Int64Type>();
        assert_eq!(&ids.values()[..], &[1, 4]);
    }

    #[test]
    fn test_drop_rows_may_empty_the_table() {
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, true)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![None, None]))])
                .unwrap();
        let result = apply(&batch, &Policy::DropRows).unwrap();
        assert_eq!(result.num_rows(), 0);
        assert_eq!(result.schema(), batch.schema());
    }

    #[test]
    fn test_fill_value_keeps_numeric_type_when_it_parses() {
        let batch = batch_with_nulls();
        let result = apply(&batch, &Policy::FillValue("0".to_string())).unwrap();

        assert_eq!(null_cells(&result), 0);
        assert_eq!(result.schema().field(0).data_type(), &DataType::Int64);
        let ids = result.column(0).as_primitive::<Int64Type>();
        assert_eq!(&ids.values()[..], &[1, 2, 0, 4]);

        let names = result.column(1).as_string::<i32>();
        assert_eq!(names.value(1), "0");
    }

    #[test]
    fn test_fill_value_turns_numeric_column_into_text() {
        let batch = batch_with_nulls();
        let result = apply(&batch, &Policy::FillValue("missing".to_string())).unwrap();

        assert_eq!(null_cells(&result), 0);
        assert_eq!(result.schema().field(0).data_type(), &DataType::Utf8);
        let ids = result.column(0).as_string::<i32>();
        assert_eq!(ids.value(0), "1");
        assert_eq!(ids.value(2), "missing");

        // Columns without nulls are left alone.
        assert_eq!(result.schema().field(2).data_type(), &DataType::Float64);
        let scores = result.column(2).as_primitive::<Float64Type>();
        assert_eq!(scores.value(3), 3.5);
    }

    #[test]
    fn test_policy_json_shape() {
        let policy: Policy =
            serde_json::from_str(r#"{"method": "fill_value", "value": "n/a"}"#).unwrap();
        assert_eq!(policy, Policy::FillValue("n/a".to_string()));

        let policy: Policy = serde_json::from_str(r#"{"method": "drop_rows"}"#).unwrap();
        assert_eq!(policy, Policy::DropRows);
    }
}
