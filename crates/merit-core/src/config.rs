use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{MeritError, MeritResult, BUCKETS_PER_YEAR};

/// Economic adjustments applied to the active bucket before costing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Adjustments {
    /// $ per kg CO2
    pub co2_tax: f64,
    /// $ per kg SO2
    pub so2_tax: f64,
    /// $ per kg NOx
    pub nox_tax: f64,
    /// $ per MMBtu added to coal fuel prices (clamped at zero)
    pub coal_price_adjustment: f64,
    /// Fraction of coal capacity removed, in [0, 1]
    pub coal_capacity_derate: f64,
}

impl Adjustments {
    pub fn validate(&self) -> MeritResult<()> {
        let values = [
            ("co2_tax", self.co2_tax),
            ("so2_tax", self.so2_tax),
            ("nox_tax", self.nox_tax),
            ("coal_price_adjustment", self.coal_price_adjustment),
            ("coal_capacity_derate", self.coal_capacity_derate),
        ];
        if let Some((name, _)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(MeritError::Config(format!("{name} must be finite")));
        }
        if !(0.0..=1.0).contains(&self.coal_capacity_derate) {
            return Err(MeritError::Config(format!(
                "coal_capacity_derate {} outside [0, 1]",
                self.coal_capacity_derate
            )));
        }
        Ok(())
    }
}

/// Settings for one dispatch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Calendar year; defaults to the year of the first demand timestamp
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub adjustments: Adjustments,
    #[serde(default = "default_true")]
    pub include_minimum_output: bool,
    /// Drop nuclear, hydro and geothermal units from the merit order
    #[serde(default)]
    pub drop_must_run_fuels: bool,
    #[serde(default = "default_reserve_weight")]
    pub minimum_downtime_reserve_weight: f64,
    /// Window used when detecting minimum-downtime events from demand
    #[serde(default = "default_min_downtime_hours")]
    pub coal_min_downtime_hours: u32,
    /// States whose units form the geographic emissions subset
    #[serde(default)]
    pub subset_states: Vec<String>,
    /// Buckets to simulate, in order
    #[serde(default = "default_buckets")]
    pub buckets: Vec<usize>,
}

fn default_true() -> bool {
    true
}

fn default_reserve_weight() -> f64 {
    0.5
}

fn default_min_downtime_hours() -> u32 {
    12
}

fn default_buckets() -> Vec<usize> {
    (1..=BUCKETS_PER_YEAR).collect()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            year: None,
            adjustments: Adjustments::default(),
            include_minimum_output: true,
            drop_must_run_fuels: false,
            minimum_downtime_reserve_weight: default_reserve_weight(),
            coal_min_downtime_hours: default_min_downtime_hours(),
            subset_states: Vec::new(),
            buckets: default_buckets(),
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> MeritResult<()> {
        self.adjustments.validate()?;
        let weight = self.minimum_downtime_reserve_weight;
        if !(0.0..=1.0).contains(&weight) {
            return Err(MeritError::Config(format!(
                "minimum_downtime_reserve_weight {weight} outside [0, 1]"
            )));
        }
        if self.coal_min_downtime_hours == 0 {
            return Err(MeritError::Config(
                "coal_min_downtime_hours must be at least 1".into(),
            ));
        }
        if let Some(bad) = self
            .buckets
            .iter()
            .find(|t| !(1..=BUCKETS_PER_YEAR).contains(t))
        {
            return Err(MeritError::Config(format!(
                "bucket {bad} outside 1..={BUCKETS_PER_YEAR}"
            )));
        }
        Ok(())
    }
}

pub fn load_config_from_path(path: &Path) -> Result<DispatchConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading dispatch config '{}'", path.display()))?;
    let config: DispatchConfig = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing dispatch config yaml")?
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing dispatch config json")?
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing dispatch config")?,
    };
    config
        .validate()
        .with_context(|| format!("validating dispatch config '{}'", path.display()))?;
    Ok(config)
}
