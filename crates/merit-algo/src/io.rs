use std::{
    ffi::OsStr,
    fs::{self, File},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
#[cfg(feature = "parquet")]
use polars::prelude::ParquetWriter;
use polars::prelude::{CsvWriter, DataFrame, NamedFrom, SerWriter, Series};

use merit_core::{Emission, FuelType, MinDowntimeEvent, Quantity};

use crate::dispatch::{DispatchRecord, SubsetRecord};
use crate::merit_order::{MeritOrder, MeritRow};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy)]
pub enum OutputStage {
    Dispatch,
    Subset,
    Stack,
    Events,
}

impl OutputStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStage::Dispatch => "dispatch",
            OutputStage::Subset => "dispatch-subset",
            OutputStage::Stack => "merit-order",
            OutputStage::Events => "mdt-events",
        }
    }
}

pub fn staged_output_path(output: &Path, stage: &str) -> PathBuf {
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    let file_name = output.file_name().unwrap_or_else(|| OsStr::new("output"));
    parent.join(stage).join(file_name)
}

/// Write `df` under the stage directory next to `output`, then copy it to
/// `output`. The format follows the output extension.
pub fn persist_dataframe(df: &mut DataFrame, output: &Path, stage: OutputStage) -> Result<()> {
    let staged = staged_output_path(output, stage.as_str());
    if let Some(parent) = staged.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }
    write_frame(df, &staged)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }
    fs::copy(&staged, output)
        .with_context(|| format!("copying {} to {}", staged.display(), output.display()))?;
    Ok(())
}

fn write_frame(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("creating output '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => CsvWriter::new(&mut file)
            .finish(df)
            .context("writing CSV output")?,
        #[cfg(feature = "parquet")]
        Some("parquet") => {
            ParquetWriter::new(&mut file)
                .finish(df)
                .context("writing Parquet output")?;
        }
        _ => bail!("unsupported output extension for '{}'", path.display()),
    }
    Ok(())
}

fn timestamps<'a>(stamps: impl Iterator<Item = &'a NaiveDateTime>) -> Vec<String> {
    stamps.map(|ts| ts.format(TIMESTAMP_FORMAT).to_string()).collect()
}

/// One row per hour with the dispatch output columns.
pub fn dispatch_frame(records: &[DispatchRecord]) -> Result<DataFrame> {
    let col = |f: fn(&DispatchRecord) -> f64| records.iter().map(f).collect::<Vec<f64>>();

    let mut columns = vec![
        Series::new("datetime", timestamps(records.iter().map(|r| &r.timestamp))),
        Series::new(
            "bucket",
            records.iter().map(|r| r.bucket as u32).collect::<Vec<u32>>(),
        ),
        Series::new("demand", col(|r| r.demand)),
        Series::new("gen_cost_marg", col(|r| r.gen_cost_marg)),
        Series::new("gen_cost_tot", col(|r| r.gen_cost_tot)),
        Series::new("co2_marg", col(|r| r.co2_marg)),
        Series::new("co2_tot", col(|r| r.co2_tot)),
        Series::new("so2_marg", col(|r| r.so2_marg)),
        Series::new("so2_tot", col(|r| r.so2_tot)),
        Series::new("nox_marg", col(|r| r.nox_marg)),
        Series::new("nox_tot", col(|r| r.nox_tot)),
    ];
    for fuel in FuelType::ALL {
        columns.push(Series::new(
            &format!("{}_mix", fuel.as_str()),
            records.iter().map(|r| r.fuel_mix[fuel]).collect::<Vec<f64>>(),
        ));
    }
    columns.push(Series::new("coal_mix_marg", col(|r| r.coal_mix_marg)));
    for fuel in FuelType::ALL {
        columns.push(Series::new(
            &format!("mmbtu_{}", fuel.as_str()),
            records
                .iter()
                .map(|r| r.fuel_consumption[fuel])
                .collect::<Vec<f64>>(),
        ));
    }
    columns.push(Series::new(
        "marg_gen",
        records
            .iter()
            .map(|r| r.marginal_unit.to_string())
            .collect::<Vec<String>>(),
    ));
    columns.push(Series::new(
        "marg_gen_fuel_type",
        records
            .iter()
            .map(|r| r.marginal_fuel.as_str().to_string())
            .collect::<Vec<String>>(),
    ));
    columns.push(Series::new(
        "mdt_threshold",
        records
            .iter()
            .map(|r| r.min_downtime_threshold)
            .collect::<Vec<Option<f64>>>(),
    ));
    DataFrame::new(columns).context("assembling dispatch frame")
}

pub fn subset_frame(records: &[SubsetRecord]) -> Result<DataFrame> {
    DataFrame::new(vec![
        Series::new("datetime", timestamps(records.iter().map(|r| &r.timestamp))),
        Series::new("demand", records.iter().map(|r| r.demand).collect::<Vec<f64>>()),
        Series::new("co2_tot", records.iter().map(|r| r.co2_tot).collect::<Vec<f64>>()),
        Series::new("so2_tot", records.iter().map(|r| r.so2_tot).collect::<Vec<f64>>()),
        Series::new("nox_tot", records.iter().map(|r| r.nox_tot).collect::<Vec<f64>>()),
    ])
    .context("assembling subset frame")
}

/// The built stack: one row per unit in merit order with cumulative bounds
/// and the full base/marginal split for cost and emissions.
pub fn merit_order_frame(order: &MeritOrder) -> Result<DataFrame> {
    let rows = order.rows();
    let col = |f: fn(&MeritRow) -> f64| rows.iter().map(f).collect::<Vec<f64>>();
    let split = |k: usize, q: Quantity, base: bool| {
        if base {
            order.full_base(k, q).unwrap_or(f64::NAN)
        } else {
            order.full_marginal(k, q).unwrap_or(f64::NAN)
        }
    };

    let mut columns = vec![
        Series::new(
            "unit_id",
            rows.iter().map(|r| r.id.to_string()).collect::<Vec<String>>(),
        ),
        Series::new(
            "fuel_type",
            rows.iter()
                .map(|r| r.fuel_type.as_str().to_string())
                .collect::<Vec<String>>(),
        ),
        Series::new(
            "state",
            rows.iter().map(|r| r.state.clone()).collect::<Vec<Option<String>>>(),
        ),
        Series::new("mw", col(|r| r.capacity)),
        Series::new("min_out", col(|r| r.min_out)),
        Series::new("gen_cost", col(|r| r.gen_cost)),
        Series::new("s", col(|r| r.s)),
        Series::new("f", col(|r| r.f)),
        Series::new("a", col(|r| r.a)),
    ];
    let quantities = std::iter::once(Quantity::Cost).chain(Emission::ALL.map(Quantity::Emission));
    for q in quantities {
        let label = q.label();
        columns.push(Series::new(
            &format!("{label}_base"),
            (0..rows.len()).map(|k| split(k, q, true)).collect::<Vec<f64>>(),
        ));
        columns.push(Series::new(
            &format!("{label}_marg"),
            (0..rows.len()).map(|k| split(k, q, false)).collect::<Vec<f64>>(),
        ));
    }
    DataFrame::new(columns).context("assembling merit order frame")
}

pub fn events_frame(events: &[MinDowntimeEvent]) -> Result<DataFrame> {
    DataFrame::new(vec![
        Series::new("start", timestamps(events.iter().map(|e| &e.start))),
        Series::new("end", timestamps(events.iter().map(|e| &e.end))),
        Series::new(
            "demand_threshold",
            events.iter().map(|e| e.demand_threshold).collect::<Vec<f64>>(),
        ),
    ])
    .context("assembling events frame")
}
