//! # merit-core: generator fleet data model
//!
//! Shared types for the hourly merit-order dispatch engine.
//!
//! ## Core Data Structures
//!
//! - [`GeneratingUnit`] - one unit with static economics and 52 weekly attribute sets
//! - [`GeneratorTable`] - the fleet consumed by the merit-order builder
//! - [`DemandPoint`] - one hourly demand observation
//! - [`MinDowntimeEvent`] - a window during which coal units hold minimum output
//! - [`Quantity`] - tagged selector for every tracked cost, emission and fuel total
//!
//! ## Sentinels
//!
//! Three synthetic units are recognised through [`UnitRole`]: a zero-cost coal
//! floor and gas floor that always lead the merit order, and a backstop with
//! effectively unbounded capacity that always trails it. Ordering is an
//! explicit `(role rank, cost, input position)` key, never a table position.
//!
//! ## Modules
//!
//! - [`config`] - dispatch configuration loaded from YAML or JSON
//! - [`diagnostics`] - validation of generator tables
//! - [`error`] - unified [`MeritError`] type

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

pub mod config;
pub mod diagnostics;
pub mod error;

pub use config::{load_config_from_path, Adjustments, DispatchConfig};
pub use diagnostics::{validate_generator_table, DiagnosticIssue, Diagnostics, Severity};
pub use error::{MeritError, MeritResult};

/// Number of weekly buckets in a simulated year.
pub const BUCKETS_PER_YEAR: usize = 52;

/// Floor applied to every regular unit's generation cost ($/MWh).
pub const MIN_GENERATION_COST: f64 = 0.01;

/// Capacity given to the backstop sentinel (MW).
pub const BACKSTOP_CAPACITY_MW: f64 = 1.0e6;

/// Fuel category of a generating unit.
///
/// Every category is tracked in fuel-mix totals so the per-fuel MW mix always
/// sums to total committed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    Coal,
    Gas,
    Oil,
    Nuclear,
    Hydro,
    Geothermal,
    Biomass,
    Other,
}

impl FuelType {
    pub const ALL: [FuelType; 8] = [
        FuelType::Coal,
        FuelType::Gas,
        FuelType::Oil,
        FuelType::Nuclear,
        FuelType::Hydro,
        FuelType::Geothermal,
        FuelType::Biomass,
        FuelType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FuelType::Coal => "coal",
            FuelType::Gas => "gas",
            FuelType::Oil => "oil",
            FuelType::Nuclear => "nuclear",
            FuelType::Hydro => "hydro",
            FuelType::Geothermal => "geothermal",
            FuelType::Biomass => "biomass",
            FuelType::Other => "other",
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Fuels excluded from the merit order when must-run units are dropped.
    pub fn is_must_run(&self) -> bool {
        matches!(self, FuelType::Nuclear | FuelType::Hydro | FuelType::Geothermal)
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FuelType {
    type Err = MeritError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coal" => Ok(FuelType::Coal),
            "gas" | "ng" | "natural_gas" => Ok(FuelType::Gas),
            "oil" => Ok(FuelType::Oil),
            "nuclear" | "nuc" => Ok(FuelType::Nuclear),
            "hydro" | "wat" => Ok(FuelType::Hydro),
            "geothermal" | "geo" => Ok(FuelType::Geothermal),
            "biomass" => Ok(FuelType::Biomass),
            "other" | "ofsl" => Ok(FuelType::Other),
            other => Err(MeritError::Parse(format!("unknown fuel type '{other}'"))),
        }
    }
}

/// Prime-mover category. Carried for identity only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrimeMover {
    SteamTurbine,
    GasTurbine,
    CombinedCycle,
    CombustionTurbine,
    #[default]
    Other,
}

impl PrimeMover {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimeMover::SteamTurbine => "st",
            PrimeMover::GasTurbine => "gt",
            PrimeMover::CombinedCycle => "cc",
            PrimeMover::CombustionTurbine => "ct",
            PrimeMover::Other => "other",
        }
    }
}

impl FromStr for PrimeMover {
    type Err = MeritError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "st" | "steam_turbine" => PrimeMover::SteamTurbine,
            "gt" | "gas_turbine" => PrimeMover::GasTurbine,
            "cc" | "ca" | "cs" | "combined_cycle" => PrimeMover::CombinedCycle,
            "ct" | "combustion_turbine" => PrimeMover::CombustionTurbine,
            _ => PrimeMover::Other,
        })
    }
}

/// Pollutant species tracked per unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emission {
    Co2,
    So2,
    Nox,
}

impl Emission {
    pub const ALL: [Emission; 3] = [Emission::Co2, Emission::So2, Emission::Nox];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emission::Co2 => "co2",
            Emission::So2 => "so2",
            Emission::Nox => "nox",
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// A tracked quantity with a cumulative curve over demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    /// Generation cost ($)
    Cost,
    /// Emissions of one species (kg)
    Emission(Emission),
    /// Output of one fuel category (MW)
    FuelMix(FuelType),
    /// Fuel burned by one fuel category (MMBtu)
    FuelConsumption(FuelType),
}

impl Quantity {
    /// Number of distinct quantities.
    pub const COUNT: usize = 1 + Emission::ALL.len() + 2 * FuelType::ALL.len();

    /// All quantities, ordered by [`Quantity::index`].
    pub fn all() -> impl Iterator<Item = Quantity> {
        std::iter::once(Quantity::Cost)
            .chain(Emission::ALL.into_iter().map(Quantity::Emission))
            .chain(FuelType::ALL.into_iter().map(Quantity::FuelMix))
            .chain(FuelType::ALL.into_iter().map(Quantity::FuelConsumption))
    }

    /// Dense index in `0..Quantity::COUNT`.
    #[inline]
    pub fn index(&self) -> usize {
        match self {
            Quantity::Cost => 0,
            Quantity::Emission(e) => 1 + e.index(),
            Quantity::FuelMix(f) => 1 + Emission::ALL.len() + f.index(),
            Quantity::FuelConsumption(f) => {
                1 + Emission::ALL.len() + FuelType::ALL.len() + f.index()
            }
        }
    }

    pub fn label(&self) -> String {
        match self {
            Quantity::Cost => "gen_cost".to_string(),
            Quantity::Emission(e) => e.as_str().to_string(),
            Quantity::FuelMix(f) => format!("{}_mix", f.as_str()),
            Quantity::FuelConsumption(f) => format!("mmbtu_{}", f.as_str()),
        }
    }
}

/// Dense per-fuel storage indexed by [`FuelType`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FuelMap<T>(pub [T; 8]);

impl<T: Copy> FuelMap<T> {
    pub fn splat(value: T) -> Self {
        FuelMap([value; 8])
    }

    pub fn iter(&self) -> impl Iterator<Item = (FuelType, T)> + '_ {
        FuelType::ALL.iter().map(move |fuel| (*fuel, self.0[fuel.index()]))
    }
}

impl<T> Index<FuelType> for FuelMap<T> {
    type Output = T;

    fn index(&self, fuel: FuelType) -> &T {
        &self.0[fuel.index()]
    }
}

impl<T> IndexMut<FuelType> for FuelMap<T> {
    fn index_mut(&mut self, fuel: FuelType) -> &mut T {
        &mut self.0[fuel.index()]
    }
}

/// Unique unit key, e.g. `"3470_1"` (plant `3470`, generator `1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    #[inline]
    pub fn new(value: impl Into<String>) -> Self {
        UnitId(value.into())
    }
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position class of a unit in the merit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitRole {
    /// Zero-cost coal floor; in a minimum-downtime override it carries the
    /// peeled minimum-output block
    CoalFloor,
    /// Zero-cost, zero-capacity gas floor
    GasFloor,
    #[default]
    Regular,
    /// Unbounded-capacity tail so demand never exceeds supply
    Backstop,
}

impl UnitRole {
    /// Primary sort key; lower ranks come first.
    #[inline]
    pub fn rank(&self) -> u8 {
        match self {
            UnitRole::CoalFloor => 0,
            UnitRole::GasFloor => 1,
            UnitRole::Regular => 2,
            UnitRole::Backstop => 3,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self, UnitRole::Regular)
    }
}

/// Attributes of one unit held constant over one weekly bucket.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BucketAttributes {
    pub capacity_mw: f64,
    /// MMBtu per MWh
    pub heat_rate: f64,
    /// kg per MWh
    pub co2: f64,
    pub so2: f64,
    pub nox: f64,
    /// $ per MMBtu
    pub fuel_price: f64,
}

impl BucketAttributes {
    pub fn emission(&self, species: Emission) -> f64 {
        match species {
            Emission::Co2 => self.co2,
            Emission::So2 => self.so2,
            Emission::Nox => self.nox,
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.capacity_mw,
            self.heat_rate,
            self.co2,
            self.so2,
            self.nox,
            self.fuel_price,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Typical minimum-output fraction for units whose data carries none.
pub fn default_min_out_fraction(fuel: FuelType, prime_mover: PrimeMover) -> f64 {
    match (fuel, prime_mover) {
        (FuelType::Coal, _) => 0.4,
        (FuelType::Gas | FuelType::Oil, PrimeMover::SteamTurbine) => 0.4,
        (FuelType::Gas | FuelType::Oil, PrimeMover::CombinedCycle) => 0.5,
        (FuelType::Gas | FuelType::Oil, PrimeMover::GasTurbine | PrimeMover::CombustionTurbine) => {
            0.5
        }
        (FuelType::Nuclear, _) => 0.5,
        (FuelType::Biomass, _) => 0.4,
        _ => 0.1,
    }
}

/// One generating unit (or lumped equivalent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratingUnit {
    pub id: UnitId,
    pub plant: String,
    pub fuel_type: FuelType,
    pub prime_mover: PrimeMover,
    /// Variable operating cost ($/MWh)
    pub vom: f64,
    /// Fraction of capacity that must run once committed
    pub min_out_fraction: f64,
    /// Geographic tag (US state abbreviation)
    pub state: Option<String>,
    #[serde(default)]
    pub role: UnitRole,
    /// Weekly attributes; bucket `t` is stored at index `t - 1`
    pub buckets: Vec<BucketAttributes>,
}

impl GeneratingUnit {
    pub fn new(id: impl Into<String>, fuel_type: FuelType, buckets: Vec<BucketAttributes>) -> Self {
        let id = UnitId::new(id);
        Self {
            plant: id.as_str().to_string(),
            id,
            fuel_type,
            prime_mover: PrimeMover::Other,
            vom: 0.0,
            min_out_fraction: 0.0,
            state: None,
            role: UnitRole::Regular,
            buckets,
        }
    }

    /// Synthetic unit for a sentinel role with zeroed attributes.
    pub fn sentinel(role: UnitRole, bucket_count: usize) -> Self {
        let (id, fuel_type, capacity) = match role {
            UnitRole::CoalFloor => ("coal_0", FuelType::Coal, 0.0),
            UnitRole::GasFloor => ("ngcc_0", FuelType::Gas, 0.0),
            UnitRole::Backstop => ("backstop", FuelType::Other, BACKSTOP_CAPACITY_MW),
            UnitRole::Regular => ("regular", FuelType::Other, 0.0),
        };
        let attrs = BucketAttributes {
            capacity_mw: capacity,
            ..BucketAttributes::default()
        };
        let mut unit = Self::new(id, fuel_type, vec![attrs; bucket_count]);
        unit.role = role;
        unit
    }

    pub fn with_plant(mut self, plant: impl Into<String>) -> Self {
        self.plant = plant.into();
        self
    }

    pub fn with_prime_mover(mut self, prime_mover: PrimeMover) -> Self {
        self.prime_mover = prime_mover;
        self
    }

    pub fn with_vom(mut self, vom: f64) -> Self {
        self.vom = vom;
        self
    }

    pub fn with_min_out_fraction(mut self, fraction: f64) -> Self {
        self.min_out_fraction = fraction;
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Attributes for bucket `t` (1-based).
    pub fn bucket(&self, t: usize) -> MeritResult<&BucketAttributes> {
        t.checked_sub(1)
            .and_then(|i| self.buckets.get(i))
            .ok_or_else(|| {
                MeritError::Validation(format!("unit {} has no attributes for bucket {t}", self.id))
            })
    }

    pub fn bucket_mut(&mut self, t: usize) -> MeritResult<&mut BucketAttributes> {
        let id = self.id.clone();
        t.checked_sub(1)
            .and_then(|i| self.buckets.get_mut(i))
            .ok_or_else(|| {
                MeritError::Validation(format!("unit {id} has no attributes for bucket {t}"))
            })
    }

    pub fn in_states(&self, states: &[String]) -> bool {
        state_in(self.state.as_deref(), states)
    }
}

/// Case-insensitive membership of a geographic tag; untagged never matches.
pub fn state_in(state: Option<&str>, states: &[String]) -> bool {
    state.is_some_and(|s| states.iter().any(|wanted| wanted.eq_ignore_ascii_case(s)))
}

/// The fleet: one row per unit with per-bucket attributes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratorTable {
    pub units: Vec<GeneratingUnit>,
}

impl GeneratorTable {
    pub fn new(units: Vec<GeneratingUnit>) -> Self {
        Self { units }
    }

    /// Bucket count of the first regular unit.
    pub fn bucket_count(&self) -> usize {
        self.units
            .iter()
            .find(|u| u.role == UnitRole::Regular)
            .or_else(|| self.units.first())
            .map(|u| u.buckets.len())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&GeneratingUnit> {
        self.units.iter().find(|u| u.id.as_str() == id)
    }

    pub fn has_role(&self, role: UnitRole) -> bool {
        self.units.iter().any(|u| u.role == role)
    }
}

/// One hourly demand observation. `None` marks a missing hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemandPoint {
    pub timestamp: NaiveDateTime,
    pub demand: Option<f64>,
}

impl DemandPoint {
    pub fn new(timestamp: NaiveDateTime, demand: f64) -> Self {
        Self {
            timestamp,
            demand: Some(demand),
        }
    }

    /// The demand value if present and finite.
    pub fn value(&self) -> Option<f64> {
        self.demand.filter(|d| d.is_finite())
    }
}

/// A window `[start, end)` during which coal units below `demand_threshold`
/// are held at minimum output instead of shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinDowntimeEvent {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub demand_threshold: f64,
}

impl MinDowntimeEvent {
    /// Intersection with `[start, end)`, if non-empty.
    pub fn clip(&self, start: NaiveDateTime, end: NaiveDateTime) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let lo = self.start.max(start);
        let hi = self.end.min(end);
        (lo < hi).then_some((lo, hi))
    }
}
