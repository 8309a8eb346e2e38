use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, UInt64Type};
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use serde_json::Value;

use crate::core::DashError;

use super::types::{ColumnJson, TableJson};

impl TryFrom<&RecordBatch> for TableJson {
    type Error = DashError;

    fn try_from(batch: &RecordBatch) -> Result<Self, DashError> {
        let schema = batch.schema();
        let columns = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(field, array)| {
                Ok(ColumnJson {
                    name: field.name().clone(),
                    dtype: field.data_type().to_string(),
                    values: array_to_json_values(array)?,
                })
            })
            .collect::<Result<Vec<_>, DashError>>()?;

        Ok(TableJson {
            num_rows: batch.num_rows(),
            columns,
        })
    }
}

/// Booleans and numbers stay JSON-native; every other type is rendered as a
/// string. Non-finite floats become `null`.
fn array_to_json_values(array: &ArrayRef) -> Result<Vec<Value>, DashError> {
    let dtype = array.data_type();
    let values = match dtype {
        DataType::Boolean => array
            .as_boolean()
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Bool))
            .collect(),
        DataType::UInt64 => array
            .as_primitive::<UInt64Type>()
            .iter()
            .map(|v| v.map_or(Value::Null, Value::from))
            .collect(),
        _ if dtype.is_integer() => cast(array, &DataType::Int64)?
            .as_primitive::<Int64Type>()
            .iter()
            .map(|v| v.map_or(Value::Null, Value::from))
            .collect(),
        _ if dtype.is_floating() || matches!(dtype, DataType::Decimal128(..) | DataType::Decimal256(..)) => {
            cast(array, &DataType::Float64)?
                .as_primitive::<Float64Type>()
                .iter()
                .map(|v| v.map_or(Value::Null, Value::from))
                .collect()
        }
        _ => cast(array, &DataType::Utf8)?
            .as_string::<i32>()
            .iter()
            .map(|v| v.map_or(Value::Null, |s| Value::String(s.to_string())))
            .collect(),
    };
    Ok(values)
}

pub fn to_arrow_ipc(batch: &RecordBatch) -> Result<Vec<u8>, DashError> {
    let mut buf = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buf, &batch.schema())?;
        writer.write(batch)?;
        writer.finish()?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{BooleanArray, Date32Array, Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_table_json() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("n", DataType::Int32, true),
            Field::new("x", DataType::Float64, true),
            Field::new("ok", DataType::Boolean, true),
            Field::new("s", DataType::Utf8, true),
            Field::new("d", DataType::Date32, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![Some(1), None])),
                Arc::new(Float64Array::from(vec![Some(1.5), Some(f64::NAN)])),
                Arc::new(BooleanArray::from(vec![Some(true), None])),
                Arc::new(StringArray::from(vec![Some("a"), None])),
                Arc::new(Date32Array::from(vec![Some(0), None])),
            ],
        )
        .unwrap();

        let table = TableJson::try_from(&batch).unwrap();
        assert_eq!(
            serde_json::to_value(&table).unwrap(),
            json!({
                "num_rows": 2,
                "columns": [
                    {"name": "n", "dtype": "Int32", "values": [1, null]},
                    {"name": "x", "dtype": "Float64", "values": [1.5, null]},
                    {"name": "ok", "dtype": "Boolean", "values": [true, null]},
                    {"name": "s", "dtype": "Utf8", "values": ["a", null]},
                    {"name": "d", "dtype": "Date32", "values": ["1970-01-01", null]},
                ]
            })
        );
    }

    #[test]
    fn test_arrow_ipc_round_trip() {
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int32, true)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![1, 2, 3]))]).unwrap();

        let bytes = to_arrow_ipc(&batch).unwrap();
        let reader =
            arrow::ipc::reader::StreamReader::try_new(std::io::Cursor::new(bytes), None).unwrap();
        let batches: Vec<_> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(batches, vec![batch]);
    }
}
