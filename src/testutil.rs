//! Deterministic fixtures for tests.
//!
//! This module is only available when the `testutil` feature is enabled.

use std::fmt::Write as _;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

use crate::conf::{Config, StorageConfig};

/// Default config with exports and the query log redirected into a fresh
/// temporary directory. Keep the `TempDir` alive for the duration of the test.
pub fn temp_config() -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let config = Config {
        storage: StorageConfig {
            export_dir: dir.path().to_path_buf(),
            query_log: dir.path().join("migration.log"),
        },
        ..Config::default()
    };
    (dir, config)
}

pub const REGIONS: [&str; 4] = ["north", "south", "east", "west"];

/// One row of the sample sales table. `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesRow {
    pub id: i64,
    pub region: Option<&'static str>,
    pub units: Option<i64>,
    pub price: f64,
}

/// Generates `num_rows` sales rows. Roughly one row in five misses its region
/// and one in seven misses its units; `price` is never missing.
pub fn sales_rows(num_rows: usize, seed: u64) -> Vec<SalesRow> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_rows)
        .map(|i| SalesRow {
            id: i as i64 + 1,
            region: (!rng.gen_bool(0.2)).then(|| REGIONS[rng.gen_range(0..REGIONS.len())]),
            units: (!rng.gen_bool(0.15)).then(|| rng.gen_range(0..100)),
            price: f64::from(rng.gen_range(1..400u32)) / 4.0,
        })
        .collect()
}

pub fn sales_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, true),
        Field::new("region", DataType::Utf8, true),
        Field::new("units", DataType::Int64, true),
        Field::new("price", DataType::Float64, true),
    ]))
}

pub fn sales_batch(rows: &[SalesRow]) -> RecordBatch {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(rows.iter().map(|r| Some(r.id)).collect::<Int64Array>()),
        Arc::new(rows.iter().map(|r| r.region).collect::<StringArray>()),
        Arc::new(rows.iter().map(|r| r.units).collect::<Int64Array>()),
        Arc::new(rows.iter().map(|r| Some(r.price)).collect::<Float64Array>()),
    ];
    RecordBatch::try_new(sales_schema(), columns).unwrap()
}

/// CSV text with a header line; missing cells are left empty. Prices always
/// carry a fractional part so they reload as floats.
pub fn sales_csv(rows: &[SalesRow]) -> String {
    let mut out = String::from("id,region,units,price\n");
    for row in rows {
        writeln!(
            out,
            "{},{},{},{:?}",
            row.id,
            row.region.unwrap_or(""),
            row.units.map(|u| u.to_string()).unwrap_or_default(),
            row.price
        )
        .unwrap();
    }
    out
}

/// A workbook with the sales rows on `Sales` and a small lookup table on
/// `Regions`.
pub fn sales_workbook(rows: &[SalesRow]) -> Vec<u8> {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Sales").unwrap();
    for (col, name) in ["id", "region", "units", "price"].iter().enumerate() {
        sheet.write_string(0, col as u16, *name).unwrap();
    }
    for (idx, row) in rows.iter().enumerate() {
        let r = idx as u32 + 1;
        sheet.write_number(r, 0, row.id as f64).unwrap();
        if let Some(region) = row.region {
            sheet.write_string(r, 1, region).unwrap();
        }
        if let Some(units) = row.units {
            sheet.write_number(r, 2, units as f64).unwrap();
        }
        sheet.write_number(r, 3, row.price).unwrap();
    }

    let lookup = workbook.add_worksheet();
    lookup.set_name("Regions").unwrap();
    lookup.write_string(0, 0, "region").unwrap();
    lookup.write_string(0, 1, "manager").unwrap();
    for (idx, region) in REGIONS.iter().enumerate() {
        let r = idx as u32 + 1;
        lookup.write_string(r, 0, *region).unwrap();
        lookup.write_string(r, 1, format!("manager {r}")).unwrap();
    }

    workbook.save_to_buffer().unwrap()
}
