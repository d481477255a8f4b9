use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::DataFrame;
use tracing::debug;

use merit_core::{
    default_min_out_fraction, BucketAttributes, FuelType, GeneratingUnit, GeneratorTable,
    MeritError, PrimeMover, BUCKETS_PER_YEAR,
};

use crate::{f64_column, has_column, read_frame, str_column};

/// Per-bucket column prefixes; bucket `t` lives in e.g. `heat_rate{t}`.
const BUCKET_FIELDS: [&str; 6] = ["mw", "heat_rate", "co2", "so2", "nox", "fuel_price"];

pub fn load_generator_table(path: &Path) -> Result<GeneratorTable> {
    let df = read_frame(path)?;
    generator_table_from_frame(&df)
        .with_context(|| format!("loading generator table '{}'", path.display()))
}

/// Build a [`GeneratorTable`] from a wide frame with one row per unit.
///
/// Required columns: `unit_id`, `fuel_type`, `vom`, and `mw{t}`,
/// `heat_rate{t}`, `co2{t}`, `so2{t}`, `nox{t}`, `fuel_price{t}` for every
/// bucket. Optional: `plant_id`, `prime_mover`, `min_out_fraction` (falls
/// back to a fuel/prime-mover default), `state`.
pub fn generator_table_from_frame(df: &DataFrame) -> Result<GeneratorTable> {
    let ids = str_column(df, "unit_id")?;
    let fuels = str_column(df, "fuel_type")?;
    let vom = f64_column(df, "vom")?;
    let plants = optional_str(df, "plant_id")?;
    let movers = optional_str(df, "prime_mover")?;
    let states = optional_str(df, "state")?;
    let fractions = if has_column(df, "min_out_fraction") {
        Some(f64_column(df, "min_out_fraction")?)
    } else {
        None
    };

    let bucket_count = (1..=BUCKETS_PER_YEAR)
        .take_while(|t| has_column(df, &format!("mw{t}")))
        .count();
    if bucket_count == 0 {
        return Err(MeritError::Validation("generator table has no 'mw1' column".into()).into());
    }
    let mut bucket_columns = Vec::with_capacity(bucket_count);
    for t in 1..=bucket_count {
        let mut fields = Vec::with_capacity(BUCKET_FIELDS.len());
        for prefix in BUCKET_FIELDS {
            let name = format!("{prefix}{t}");
            if !has_column(df, &name) {
                return Err(MeritError::Validation(format!(
                    "generator table is missing column '{name}' for bucket {t}"
                ))
                .into());
            }
            fields.push(f64_column(df, &name)?);
        }
        bucket_columns.push(fields);
    }

    let mut units = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let id = ids[row]
            .clone()
            .ok_or_else(|| MeritError::Validation(format!("row {row} has no unit_id")))?;
        let fuel: FuelType = fuels[row]
            .as_deref()
            .ok_or_else(|| MeritError::Validation(format!("unit {id} has no fuel_type")))?
            .parse()?;
        let prime_mover: PrimeMover = movers[row].as_deref().unwrap_or("other").parse()?;
        let vom = vom[row]
            .ok_or_else(|| MeritError::Validation(format!("unit {id} has no vom")))?;
        let min_out_fraction = fractions
            .as_ref()
            .and_then(|col| col[row])
            .unwrap_or_else(|| default_min_out_fraction(fuel, prime_mover));

        let mut buckets = Vec::with_capacity(bucket_count);
        for (i, fields) in bucket_columns.iter().enumerate() {
            let cell = |f: usize| {
                fields[f][row].ok_or_else(|| {
                    MeritError::Validation(format!(
                        "unit {id} is missing {} for bucket {}",
                        BUCKET_FIELDS[f],
                        i + 1
                    ))
                })
            };
            buckets.push(BucketAttributes {
                capacity_mw: cell(0)?,
                heat_rate: cell(1)?,
                co2: cell(2)?,
                so2: cell(3)?,
                nox: cell(4)?,
                fuel_price: cell(5)?,
            });
        }

        let mut unit = GeneratingUnit::new(id.clone(), fuel, buckets)
            .with_prime_mover(prime_mover)
            .with_vom(vom)
            .with_min_out_fraction(min_out_fraction)
            .with_plant(plants[row].clone().unwrap_or(id));
        unit.state = states[row].clone();
        units.push(unit);
    }

    debug!(units = units.len(), buckets = bucket_count, "loaded generator table");
    Ok(GeneratorTable::new(units))
}

fn optional_str(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    if has_column(df, name) {
        str_column(df, name)
    } else {
        Ok(vec![None; df.height()])
    }
}
