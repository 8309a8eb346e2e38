use std::io::Cursor;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use super::unique_column_names;
use crate::core::DashError;

pub(super) fn read_csv(data: &[u8]) -> Result<RecordBatch, DashError> {
    let format = Format::default().with_header(true);

    let (inferred, _) = format
        .infer_schema(Cursor::new(data), None)
        .map_err(parse_error)?;

    if inferred.fields().is_empty() {
        return Err(DashError::ParseError(
            "no columns to parse from file".to_string(),
        ));
    }

    let names = unique_column_names(inferred.fields().iter().map(|f| f.name().as_str()));
    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .zip(names)
        .map(|(field, name)| match field.data_type() {
            // Columns with no values at all are read as text.
            DataType::Null => Field::new(name, DataType::Utf8, true),
            dtype => Field::new(name, dtype.clone(), true),
        })
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .build(Cursor::new(data))
        .map_err(parse_error)?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(parse_error)?;

    concat_batches(&schema, &batches).map_err(parse_error)
}

fn parse_error(err: arrow::error::ArrowError) -> DashError {
    DashError::ParseError(err.to_string())
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Float64Type, Int64Type};

    use super::*;

    #[test]
    fn test_read_csv_infers_types_and_nulls() {
        let data = b"id,name,score\n1,alice,1.5\n2,,\n3,carol,2.25\n";
        let batch = read_csv(data).unwrap();

        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 3);

        let schema = batch.schema();
        assert_eq!(schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(schema.field(1).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(2).data_type(), &DataType::Float64);

        let ids = batch.column(0).as_primitive::<Int64Type>();
        assert_eq!(&ids.values()[..], &[1, 2, 3]);

        let names = batch.column(1).as_string::<i32>();
        assert_eq!(names.value(0), "alice");
        assert!(names.is_null(1));

        let scores = batch.column(2).as_primitive::<Float64Type>();
        assert_eq!(scores.value(2), 2.25);
        assert!(scores.is_null(1));
    }

    #[test]
    fn test_read_csv_header_only() {
        let batch = read_csv(b"a,b\n").unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 2);
    }

    #[test]
    fn test_read_csv_empty_input() {
        assert_eq!(
            read_csv(b""),
            Err(DashError::ParseError(
                "no columns to parse from file".to_string()
            ))
        );
    }

    #[test]
    fn test_read_csv_ragged_rows() {
        let result = read_csv(b"a,b\n1,2\n3,4,5\n");
        assert!(matches!(result, Err(DashError::ParseError(_))));
    }

    #[test]
    fn test_read_csv_invalid_utf8() {
        let result = read_csv(b"name\n\xff\xfe\n");
        assert!(matches!(result, Err(DashError::ParseError(_))));
    }

    #[test]
    fn test_read_csv_renames_duplicate_headers() {
        let batch = read_csv(b"x,x\n1,2\n").unwrap();
        let schema = batch.schema();
        assert_eq!(schema.field(0).name(), "x");
        assert_eq!(schema.field(1).name(), "x.1");
    }
}
