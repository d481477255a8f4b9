use crate::io::{staged_output_path, OutputStage};
use anyhow::{Context, Result};
use polars::prelude::{CsvReader, DataFrame, SerReader};
use std::{fs::File, path::Path};

use merit_core::{BucketAttributes, FuelType, GeneratingUnit, GeneratorTable};

pub fn read_stage_dataframe(base: &Path, stage: OutputStage) -> Result<DataFrame> {
    let path = staged_output_path(base, stage.as_str());
    let mut file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    CsvReader::new(&mut file)
        .has_header(true)
        .finish()
        .context("reading stage CSV output")
}

/// A unit with identical attributes in every bucket.
pub fn flat_unit(
    id: &str,
    fuel: FuelType,
    capacity_mw: f64,
    cost: f64,
    co2: f64,
    buckets: usize,
) -> GeneratingUnit {
    let attrs = BucketAttributes {
        capacity_mw,
        heat_rate: 1.0,
        co2,
        so2: 0.0,
        nox: 0.0,
        fuel_price: cost,
    };
    GeneratingUnit::new(id, fuel, vec![attrs; buckets])
}

/// Three units costing 10, 20 and 30 $/MWh with 100, 50 and 50 MW and 50%
/// minimum output.
pub fn three_unit_table(buckets: usize) -> GeneratorTable {
    GeneratorTable::new(vec![
        flat_unit("u1", FuelType::Coal, 100.0, 10.0, 1000.0, buckets).with_min_out_fraction(0.5),
        flat_unit("u2", FuelType::Gas, 50.0, 20.0, 400.0, buckets).with_min_out_fraction(0.5),
        flat_unit("u3", FuelType::Oil, 50.0, 30.0, 800.0, buckets).with_min_out_fraction(0.5),
    ])
}
