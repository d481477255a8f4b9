use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

use merit_core::DispatchConfig;

#[derive(Parser, Debug)]
#[command(name = "merit", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispatch an hourly demand series against the fleet
    Dispatch(DispatchArgs),
    /// Detect coal minimum-downtime events in a demand series
    Events(EventsArgs),
    /// Write the merit order for one bucket
    Stack(StackArgs),
}

#[derive(Args, Debug)]
pub struct DispatchArgs {
    /// Generator table (CSV or Parquet), one row per unit
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub generators: PathBuf,

    /// Hourly demand series with `datetime` and `demand` columns
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub demand: PathBuf,

    /// Minimum-downtime events with `start`, `end`, `demand_threshold`
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "detect_events")]
    pub events: Option<PathBuf>,

    /// Detect minimum-downtime events from the demand series
    #[arg(long)]
    pub detect_events: bool,

    /// Run configuration (YAML or JSON)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Calendar year (defaults to the year of the first demand hour)
    #[arg(long)]
    pub year: Option<i32>,

    /// CO2 tax ($/kg)
    #[arg(long)]
    pub co2_tax: Option<f64>,

    /// SO2 tax ($/kg)
    #[arg(long)]
    pub so2_tax: Option<f64>,

    /// NOx tax ($/kg)
    #[arg(long)]
    pub nox_tax: Option<f64>,

    /// Added to every coal fuel price ($/MMBtu)
    #[arg(long, allow_hyphen_values = true)]
    pub coal_price_adjustment: Option<f64>,

    /// Fraction of coal capacity removed
    #[arg(long)]
    pub coal_capacity_derate: Option<f64>,

    /// Ignore unit minimum output when splitting base and marginal values
    #[arg(long)]
    pub no_min_output: bool,

    /// Drop nuclear, hydro and geothermal units
    #[arg(long)]
    pub drop_must_run: bool,

    /// Buckets to simulate (comma separated, default all)
    #[arg(long, value_delimiter = ',')]
    pub buckets: Option<Vec<usize>>,

    /// States forming the emissions subset (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub subset_states: Option<Vec<String>>,

    /// Output file for hourly results (.csv or .parquet)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: PathBuf,

    /// Output file for subset emissions
    #[arg(long, value_hint = ValueHint::FilePath, requires = "subset_states")]
    pub subset_out: Option<PathBuf>,
}

impl DispatchArgs {
    /// Fold command-line flags over a loaded configuration.
    pub fn apply(&self, config: &mut DispatchConfig) {
        if let Some(year) = self.year {
            config.year = Some(year);
        }
        let adj = &mut config.adjustments;
        if let Some(v) = self.co2_tax {
            adj.co2_tax = v;
        }
        if let Some(v) = self.so2_tax {
            adj.so2_tax = v;
        }
        if let Some(v) = self.nox_tax {
            adj.nox_tax = v;
        }
        if let Some(v) = self.coal_price_adjustment {
            adj.coal_price_adjustment = v;
        }
        if let Some(v) = self.coal_capacity_derate {
            adj.coal_capacity_derate = v;
        }
        if self.no_min_output {
            config.include_minimum_output = false;
        }
        if self.drop_must_run {
            config.drop_must_run_fuels = true;
        }
        if let Some(buckets) = &self.buckets {
            config.buckets = buckets.clone();
        }
        if let Some(states) = &self.subset_states {
            config.subset_states = states.clone();
        }
    }
}

#[derive(Args, Debug)]
pub struct EventsArgs {
    /// Hourly demand series with `datetime` and `demand` columns
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub demand: PathBuf,

    /// Minimum downtime of coal units (hours)
    #[arg(long, default_value_t = 12)]
    pub min_downtime: u32,

    /// Output file for detected events (.csv or .parquet)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct StackArgs {
    /// Generator table (CSV or Parquet), one row per unit
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub generators: PathBuf,

    /// Bucket (week) to rank, 1-based
    #[arg(long, default_value_t = 1)]
    pub bucket: usize,

    /// Run configuration (YAML or JSON)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Output file for the merit order (.csv or .parquet)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: PathBuf,
}
