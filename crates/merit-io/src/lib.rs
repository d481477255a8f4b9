//! Tabular inputs for dispatch runs.
//!
//! Generator tables, demand series and minimum-downtime event lists are read
//! from CSV or Parquet with polars and converted into `merit-core` types.
//! Anything the engine cannot run without (a missing column, a null
//! per-bucket cell) is rejected here with a [`merit_core::MeritError::Validation`]
//! that names the column, unit and bucket.

use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use polars::prelude::*;

pub mod generators;
pub mod series;

pub use generators::{generator_table_from_frame, load_generator_table};
pub use series::{
    demand_series_from_frame, events_from_frame, load_demand_series, load_min_downtime_events,
    parse_timestamp,
};

/// Read a CSV or Parquet file into a DataFrame, chosen by extension.
pub fn read_frame(path: &Path) -> Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;

    match extension.as_str() {
        #[cfg(feature = "parquet")]
        "parquet" => {
            let reader = ParquetReader::new(&mut file);
            reader.finish().context("reading Parquet file")
        }
        #[cfg(not(feature = "parquet"))]
        "parquet" => Err(anyhow!(
            "parquet support is disabled; rebuild with the 'parquet' feature"
        )),
        "csv" => {
            let reader = CsvReader::new(&mut file);
            reader.has_header(true).finish().context("reading CSV file")
        }
        _ => Err(anyhow!(
            "unsupported file extension '{}'; use .csv or .parquet",
            extension
        )),
    }
}

pub(crate) fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| *c == name)
}

pub(crate) fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .with_context(|| format!("missing '{name}' column"))?
        .cast(&DataType::Float64)
        .with_context(|| format!("casting '{name}' column to Float64"))?;
    let values = series
        .f64()
        .with_context(|| format!("'{name}' column must be numeric"))?;
    Ok(values.into_iter().collect())
}

pub(crate) fn str_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df
        .column(name)
        .with_context(|| format!("missing '{name}' column"))?
        .cast(&DataType::Utf8)
        .with_context(|| format!("casting '{name}' column to utf8"))?;
    let values = series
        .utf8()
        .with_context(|| format!("'{name}' column must be utf8"))?;
    Ok(values
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        .collect())
}
