use std::sync::Arc;

use ahash::AHashMap;
use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use thiserror::Error;

/// Relation name the uploaded table is exposed under.
pub const TABLE_NAME: &str = "data";

#[derive(Debug, Error)]
pub(super) enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Arrow(#[from] ArrowError),
    #[error("table has no columns")]
    NoColumns,
    #[error("only read-only statements are allowed")]
    NotReadOnly,
}

/// In-memory SQLite database that lives for exactly one query. The
/// connection is closed when the store is dropped, whichever way the query
/// ends.
pub(super) struct EphemeralStore {
    conn: Connection,
    source_types: AHashMap<String, DataType>,
}

impl EphemeralStore {
    pub(super) fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        debug!("ephemeral store acquired");
        Ok(Self {
            conn,
            source_types: AHashMap::new(),
        })
    }

    /// Creates `data` with one column per table column and copies every row
    /// in a single transaction.
    pub(super) fn load(&mut self, batch: &RecordBatch) -> Result<(), StoreError> {
        if batch.num_columns() == 0 {
            return Err(StoreError::NoColumns);
        }

        let schema = batch.schema();
        let definitions: Vec<String> = schema
            .fields()
            .iter()
            .map(|f| format!("{} {}", quote_ident(f.name()), declared_type(f.data_type())))
            .collect();
        self.conn.execute_batch(&format!(
            "CREATE TABLE {} ({})",
            quote_ident(TABLE_NAME),
            definitions.join(", ")
        ))?;

        let columns = batch
            .columns()
            .iter()
            .map(SqlColumn::try_from_array)
            .collect::<Result<Vec<_>, _>>()?;

        let placeholders = vec!["?"; columns.len()].join(", ");
        let insert = format!(
            "INSERT INTO {} VALUES ({})",
            quote_ident(TABLE_NAME),
            placeholders
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&insert)?;
            for row in 0..batch.num_rows() {
                stmt.execute(params_from_iter(columns.iter().map(|c| c.value(row))))?;
            }
        }
        tx.commit()?;

        self.source_types = schema
            .fields()
            .iter()
            .map(|f| (f.name().clone(), f.data_type().clone()))
            .collect();

        debug!(
            "loaded {} rows x {} columns into ephemeral store",
            batch.num_rows(),
            batch.num_columns()
        );
        Ok(())
    }

    pub(super) fn query(&self, sql: &str, read_only: bool) -> Result<RecordBatch, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        if read_only && !stmt.readonly() {
            return Err(StoreError::NotReadOnly);
        }

        let columns: Vec<(String, Option<String>)> = stmt
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.decl_type().map(str::to_string)))
            .collect();

        let mut values: Vec<Vec<Value>> = vec![Vec::new(); columns.len()];
        let mut num_rows = 0;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for (idx, column) in values.iter_mut().enumerate() {
                column.push(row.get::<_, Value>(idx)?);
            }
            num_rows += 1;
        }

        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays = Vec::with_capacity(columns.len());
        for ((name, decl), column) in columns.into_iter().zip(values) {
            let mut array = infer_array(&column);
            if let Some(source) = self.carried_source_type(&name, decl.as_deref()) {
                array = restore_type(array, source);
            }
            fields.push(Field::new(name, array.data_type().clone(), true));
            arrays.push(array);
        }

        let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
        Ok(RecordBatch::try_new_with_options(
            Arc::new(Schema::new(fields)),
            arrays,
            &options,
        )?)
    }

    /// A result column that passes a source column through unchanged keeps
    /// both its name and its declared SQL type.
    fn carried_source_type(&self, name: &str, decl: Option<&str>) -> Option<&DataType> {
        let source = self.source_types.get(name)?;
        (decl? == declared_type(source)).then_some(source)
    }
}

impl Drop for EphemeralStore {
    fn drop(&mut self) {
        debug!("ephemeral store released");
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(super) fn declared_type(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => "INTEGER",
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => "REAL",
        DataType::Boolean => "BOOLEAN",
        DataType::Date32 | DataType::Date64 => "DATE",
        DataType::Timestamp(_, _) => "TIMESTAMP",
        _ => "TEXT",
    }
}

/// A table column normalized to one of SQLite's storage classes.
enum SqlColumn {
    Integer(Int64Array),
    Real(Float64Array),
    Text(StringArray),
}

impl SqlColumn {
    fn try_from_array(array: &ArrayRef) -> Result<Self, ArrowError> {
        Ok(match declared_type(array.data_type()) {
            "INTEGER" | "BOOLEAN" => {
                SqlColumn::Integer(cast(array, &DataType::Int64)?.as_primitive::<Int64Type>().clone())
            }
            "REAL" => {
                SqlColumn::Real(cast(array, &DataType::Float64)?.as_primitive::<Float64Type>().clone())
            }
            _ => SqlColumn::Text(cast(array, &DataType::Utf8)?.as_string::<i32>().clone()),
        })
    }

    fn value(&self, row: usize) -> Value {
        match self {
            SqlColumn::Integer(arr) if arr.is_valid(row) => Value::Integer(arr.value(row)),
            SqlColumn::Real(arr) if arr.is_valid(row) => Value::Real(arr.value(row)),
            SqlColumn::Text(arr) if arr.is_valid(row) => Value::Text(arr.value(row).to_string()),
            _ => Value::Null,
        }
    }
}

/// Picks the narrowest Arrow type that holds every value: integers, then
/// floats, then text. A column of nulls becomes text.
fn infer_array(values: &[Value]) -> ArrayRef {
    let has_text = values
        .iter()
        .any(|v| matches!(v, Value::Text(_) | Value::Blob(_)));
    let has_real = values.iter().any(|v| matches!(v, Value::Real(_)));
    let has_integer = values.iter().any(|v| matches!(v, Value::Integer(_)));

    if has_text || !(has_real || has_integer) {
        let array: StringArray = values.iter().map(render).collect();
        return Arc::new(array);
    }

    if has_real {
        let array: Float64Array = values
            .iter()
            .map(|v| match v {
                Value::Integer(i) => Some(*i as f64),
                Value::Real(f) => Some(*f),
                _ => None,
            })
            .collect();
        return Arc::new(array);
    }

    let array: Int64Array = values
        .iter()
        .map(|v| match v {
            Value::Integer(i) => Some(*i),
            _ => None,
        })
        .collect();
    Arc::new(array)
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s.clone()),
        Value::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
    }
}

/// Casts back to the source type, unless the cast would lose values.
fn restore_type(array: ArrayRef, source: &DataType) -> ArrayRef {
    if array.data_type() == source {
        return array;
    }
    match cast(&array, source) {
        Ok(restored) if restored.null_count() == array.null_count() => restored,
        _ => array,
    }
}
