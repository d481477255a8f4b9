//! Merit-order ("bid stack") construction.
//!
//! A [`MeritOrderBuilder`] holds the fleet, the economic adjustments and the
//! active bucket. Every call to [`MeritOrderBuilder::build`] produces a fresh,
//! immutable [`MeritOrder`]: units costed, sorted, annotated with their
//! cumulative boundaries, and carrying every curve the dispatch loop queries.
//!
//! For each unit `k` in merit order:
//!
//! ```text
//! s = cumulative capacity before k
//! f = s + capacity
//! a = max(s - 10 * min_out, 1)        anchor for the minimum-output blend
//! ```
//!
//! Simple curves are the running sum of `value * capacity`. Full curves split
//! each unit into a committed base and a marginal rate:
//!
//! ```text
//! base = 0.1 * C(a) + 0.9 * C(s) + value * min_out
//! marg = slope(a, s) * min_out / capacity + value * (1 - min_out / capacity)
//! ```
//!
//! and, for emissions and fuel quantities, blend the marginal rate against the
//! average coal rate between `f` and the minimum-downtime threshold.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use merit_core::{
    state_in, validate_generator_table, Adjustments, BucketAttributes, DispatchConfig, Emission,
    FuelType, GeneratingUnit, GeneratorTable, MeritError, MeritResult, PrimeMover, Quantity,
    UnitId, UnitRole, MIN_GENERATION_COST,
};

use crate::curve::{DomainPolicy, PiecewiseLinear, StepLookup};

/// The anchor sits this many minimum-output blocks below `s`.
pub const ANCHOR_SPAN_FACTOR: f64 = 10.0;
/// Lowest allowed anchor (MW).
pub const ANCHOR_FLOOR_MW: f64 = 1.0;
/// Weight of the anchor total in the committed base; `s` gets the rest.
pub const ANCHOR_BLEND: f64 = 0.1;

/// Modelling switches that stay fixed for the life of a builder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BuilderOptions {
    pub include_minimum_output: bool,
    pub drop_must_run_fuels: bool,
    /// Share of the marginal rate handed to forced-on coal below the threshold
    pub minimum_downtime_reserve_weight: f64,
    /// Demand below which coal is held at minimum output (0 disables)
    pub coal_mdt_demand_threshold: f64,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            include_minimum_output: true,
            drop_must_run_fuels: false,
            minimum_downtime_reserve_weight: 0.5,
            coal_mdt_demand_threshold: 0.0,
        }
    }
}

impl From<&DispatchConfig> for BuilderOptions {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            include_minimum_output: config.include_minimum_output,
            drop_must_run_fuels: config.drop_must_run_fuels,
            minimum_downtime_reserve_weight: config.minimum_downtime_reserve_weight,
            coal_mdt_demand_threshold: 0.0,
        }
    }
}

impl BuilderOptions {
    pub fn validate(&self) -> MeritResult<()> {
        let w = self.minimum_downtime_reserve_weight;
        if !(0.0..=1.0).contains(&w) {
            return Err(MeritError::Config(format!(
                "minimum_downtime_reserve_weight {w} outside [0, 1]"
            )));
        }
        let thr = self.coal_mdt_demand_threshold;
        if !thr.is_finite() || thr < 0.0 {
            return Err(MeritError::Config(format!(
                "coal minimum-downtime threshold {thr} must be finite and non-negative"
            )));
        }
        Ok(())
    }
}

/// Generation cost before the floor: fuel, emission taxes and VOM.
pub fn generation_cost(attrs: &BucketAttributes, fuel_price: f64, vom: f64, adj: &Adjustments) -> f64 {
    attrs.heat_rate * fuel_price
        + attrs.co2 * adj.co2_tax
        + attrs.so2 * adj.so2_tax
        + attrs.nox * adj.nox_tax
        + vom
}

/// Builds merit orders for one fleet.
#[derive(Debug, Clone)]
pub struct MeritOrderBuilder {
    table: Arc<GeneratorTable>,
    adjustments: Adjustments,
    options: BuilderOptions,
    bucket: usize,
}

impl MeritOrderBuilder {
    /// Validate the fleet, drop must-run fuels if asked, and inject the
    /// sentinel units. Bucket 1 is selected.
    pub fn new(table: GeneratorTable, options: BuilderOptions) -> MeritResult<Self> {
        options.validate()?;
        let diagnostics = validate_generator_table(&table).into_result()?;
        for issue in diagnostics.warnings() {
            debug!(%issue, "generator table warning");
        }

        let bucket_count = table.bucket_count();
        let mut table = GeneratorTable::new(
            table
                .units
                .into_iter()
                .filter(|u| !(options.drop_must_run_fuels && u.fuel_type.is_must_run()))
                .collect(),
        );
        if table.units.iter().all(|u| u.role.is_sentinel()) {
            return Err(MeritError::Validation(
                "generator table has no dispatchable units".into(),
            ));
        }

        for role in [UnitRole::GasFloor, UnitRole::CoalFloor] {
            if !table.has_role(role) {
                table.units.insert(0, GeneratingUnit::sentinel(role, bucket_count));
            }
        }
        if !table.has_role(UnitRole::Backstop) {
            table
                .units
                .push(GeneratingUnit::sentinel(UnitRole::Backstop, bucket_count));
        }

        Ok(Self {
            table: Arc::new(table),
            adjustments: Adjustments::default(),
            options,
            bucket: 1,
        })
    }

    /// Builder over an already prepared table; sentinels are not injected.
    pub(crate) fn from_parts(
        table: GeneratorTable,
        adjustments: Adjustments,
        options: BuilderOptions,
        bucket: usize,
    ) -> MeritResult<Self> {
        options.validate()?;
        Ok(Self {
            table: Arc::new(table),
            adjustments,
            options,
            bucket,
        })
    }

    pub fn set_adjustments(&mut self, adjustments: Adjustments) -> MeritResult<()> {
        adjustments.validate()?;
        self.adjustments = adjustments;
        Ok(())
    }

    pub fn select_bucket(&mut self, bucket: usize) -> MeritResult<()> {
        let count = self.table.bucket_count();
        if !(1..=count).contains(&bucket) {
            return Err(MeritError::Config(format!(
                "bucket {bucket} outside 1..={count}"
            )));
        }
        self.bucket = bucket;
        Ok(())
    }

    pub fn adjustments(&self) -> &Adjustments {
        &self.adjustments
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    pub fn bucket(&self) -> usize {
        self.bucket
    }

    pub fn table(&self) -> &GeneratorTable {
        &self.table
    }

    pub fn build(&self) -> MeritResult<MeritOrder> {
        let rows = self.ranked_rows()?;
        let order = MeritOrder::from_rows(self.bucket, self.options, rows)?;
        debug!(
            bucket = self.bucket,
            units = order.rows.len(),
            threshold = self.options.coal_mdt_demand_threshold,
            "built merit order"
        );
        Ok(order)
    }

    // Steps 1-4: adjust, cost, sort, accumulate.
    fn ranked_rows(&self) -> MeritResult<Vec<MeritRow>> {
        let t = self.bucket;
        let adj = &self.adjustments;
        let mut rows = Vec::with_capacity(self.table.len());

        for (position, unit) in self.table.units.iter().enumerate() {
            let attrs = *unit.bucket(t)?;
            let mut capacity = attrs.capacity_mw;
            let mut fuel_price = attrs.fuel_price;
            if unit.fuel_type == FuelType::Coal {
                fuel_price = (fuel_price + adj.coal_price_adjustment).max(0.0);
                capacity *= 1.0 - adj.coal_capacity_derate;
            }
            let mut gen_cost = generation_cost(&attrs, fuel_price, unit.vom, adj);
            if !unit.role.is_sentinel() {
                gen_cost = gen_cost.max(MIN_GENERATION_COST);
            }

            rows.push(MeritRow {
                id: unit.id.clone(),
                fuel_type: unit.fuel_type,
                prime_mover: unit.prime_mover,
                state: unit.state.clone(),
                role: unit.role,
                position,
                capacity,
                min_out_fraction: unit.min_out_fraction,
                min_out: capacity * unit.min_out_fraction,
                heat_rate: attrs.heat_rate,
                co2: attrs.co2,
                so2: attrs.so2,
                nox: attrs.nox,
                fuel_price,
                vom: unit.vom,
                gen_cost,
                s: 0.0,
                f: 0.0,
                a: 0.0,
            });
        }

        let ceiling = rows
            .iter()
            .filter(|r| r.role == UnitRole::Regular)
            .map(|r| r.gen_cost)
            .fold(MIN_GENERATION_COST, f64::max);
        for row in rows.iter_mut().filter(|r| r.role == UnitRole::Backstop) {
            row.gen_cost = ceiling;
        }

        // Role rank before cost: coal_0 and ngcc_0 hold positions 0 and 1 whatever
        // they cost, and the backstop is always last.
        rows.sort_by(|x, y| {
            x.role
                .rank()
                .cmp(&y.role.rank())
                .then(x.gen_cost.total_cmp(&y.gen_cost))
                .then(x.position.cmp(&y.position))
        });

        let mut running = 0.0;
        for row in rows.iter_mut() {
            if !row.capacity.is_finite() || row.capacity < 0.0 {
                return Err(MeritError::Validation(format!(
                    "unit {} has capacity {} in bucket {t}",
                    row.id, row.capacity
                )));
            }
            row.s = running;
            running += row.capacity;
            row.f = running;
            row.a = (row.s - ANCHOR_SPAN_FACTOR * row.min_out).max(ANCHOR_FLOOR_MW);
        }
        if let Some(pair) = rows.windows(2).find(|w| w[1].s < w[0].s || w[1].f < w[0].f) {
            return Err(MeritError::Validation(format!(
                "cumulative capacity decreases at unit {} in bucket {t}",
                pair[1].id
            )));
        }
        Ok(rows)
    }
}

/// One unit in a built merit order, with active-bucket attributes after
/// adjustments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeritRow {
    pub id: UnitId,
    pub fuel_type: FuelType,
    pub prime_mover: PrimeMover,
    pub state: Option<String>,
    pub role: UnitRole,
    /// Position in the source table (final tie-breaker)
    pub position: usize,
    pub capacity: f64,
    pub min_out_fraction: f64,
    pub min_out: f64,
    pub heat_rate: f64,
    pub co2: f64,
    pub so2: f64,
    pub nox: f64,
    pub fuel_price: f64,
    pub vom: f64,
    pub gen_cost: f64,
    pub s: f64,
    pub f: f64,
    pub a: f64,
}

impl MeritRow {
    pub fn emission(&self, species: Emission) -> f64 {
        match species {
            Emission::Co2 => self.co2,
            Emission::So2 => self.so2,
            Emission::Nox => self.nox,
        }
    }

    /// Per-MW contribution of this unit to `quantity`.
    pub fn point_value(&self, quantity: Quantity) -> f64 {
        match quantity {
            Quantity::Cost => self.gen_cost,
            Quantity::Emission(e) => self.emission(e),
            Quantity::FuelMix(fuel) => indicator(self.fuel_type == fuel),
            Quantity::FuelConsumption(fuel) => indicator(self.fuel_type == fuel) * self.heat_rate,
        }
    }

    pub fn is_coal(&self) -> bool {
        self.fuel_type == FuelType::Coal
    }

    pub fn in_states(&self, states: &[String]) -> bool {
        state_in(self.state.as_deref(), states)
    }
}

#[inline]
fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

/// Unit attribute read through the marginal-unit step lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginalField {
    GenCost,
    Capacity,
    MinOutput,
    HeatRate,
    FuelPrice,
    Vom,
    Emission(Emission),
    /// The unit's full marginal rate for a quantity
    FullMarginal(Quantity),
}

/// An immutable merit order for one (bucket, adjustments, override) tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct MeritOrder {
    bucket: usize,
    options: BuilderOptions,
    rows: Vec<MeritRow>,
    steps: StepLookup,
    simple: Vec<PiecewiseLinear>,
    coal_emissions: Vec<PiecewiseLinear>,
    base: Vec<Vec<f64>>,
    marginal: Vec<Vec<f64>>,
    full: Vec<PiecewiseLinear>,
}

impl MeritOrder {
    fn from_rows(bucket: usize, options: BuilderOptions, rows: Vec<MeritRow>) -> MeritResult<Self> {
        let steps = StepLookup::new(rows.iter().map(|r| r.f).collect())?;

        let simple = Quantity::all()
            .map(|q| cumulative_curve(&rows, |r| r.point_value(q)))
            .collect::<MeritResult<Vec<_>>>()?;
        let coal_emissions = Emission::ALL
            .iter()
            .map(|&e| cumulative_curve(&rows, |r| indicator(r.is_coal()) * r.emission(e)))
            .collect::<MeritResult<Vec<_>>>()?;

        let mut order = Self {
            bucket,
            options,
            rows,
            steps,
            simple,
            coal_emissions,
            base: Vec::with_capacity(Quantity::COUNT),
            marginal: Vec::with_capacity(Quantity::COUNT),
            full: Vec::with_capacity(Quantity::COUNT),
        };

        for q in Quantity::all() {
            let (base, marginal) = order.split(q)?;
            let mut xs = Vec::with_capacity(order.rows.len() + 1);
            let mut ys = Vec::with_capacity(order.rows.len() + 1);
            xs.push(order.rows[0].s);
            ys.push(base[0]);
            for (k, row) in order.rows.iter().enumerate() {
                xs.push(row.f);
                ys.push(base[k] + (row.f - row.s) * marginal[k]);
            }
            order
                .full
                .push(PiecewiseLinear::new(xs, ys, DomainPolicy::Strict)?);
            order.base.push(base);
            order.marginal.push(marginal);
        }
        Ok(order)
    }

    // Base and marginal values of every row for one quantity.
    fn split(&self, q: Quantity) -> MeritResult<(Vec<f64>, Vec<f64>)> {
        let curve = self.simple_curve(q);
        let coal_mw = self.simple_curve(Quantity::FuelMix(FuelType::Coal));
        let threshold = self.options.coal_mdt_demand_threshold;
        let weight = self.options.minimum_downtime_reserve_weight;
        let coal_at_threshold = coal_mw.eval(threshold)?;

        let mut base = Vec::with_capacity(self.rows.len());
        let mut marginal = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let value = row.point_value(q);
            let capacity = row.f - row.s;
            let (b, normal) = if self.options.include_minimum_output {
                let at_s = curve.eval(row.s)?;
                let at_a = curve.eval(row.a)?;
                let share = if capacity > 0.0 { row.min_out / capacity } else { 0.0 };
                let slope = if row.s != row.a {
                    (at_s - at_a) / (row.s - row.a)
                } else {
                    0.0
                };
                (
                    ANCHOR_BLEND * at_a + (1.0 - ANCHOR_BLEND) * at_s + value * row.min_out,
                    slope * share + value * (1.0 - share),
                )
            } else {
                (curve.eval(row.s)?, value)
            };

            let m = if q == Quantity::Cost {
                normal
            } else {
                let coal_drop = (coal_at_threshold - coal_mw.eval(row.f)?).max(0.0);
                let below = coal_drop > 0.0;
                let w_marginal = (1.0 - weight) + weight * indicator(!below);
                let w_mdt = 1.0 - w_marginal;
                let forced_rate = if below {
                    self.forced_coal_rate(q, threshold, row.f, coal_drop)?
                } else {
                    0.0
                };
                normal * w_marginal + forced_rate * w_mdt
            };

            if !b.is_finite() || !m.is_finite() {
                return Err(MeritError::Config(format!(
                    "non-finite {} split for unit {} in bucket {}",
                    q.label(),
                    row.id,
                    self.bucket
                )));
            }
            base.push(b);
            marginal.push(m);
        }
        Ok((base, marginal))
    }

    // Average rate of coal capacity between `f` and the threshold.
    fn forced_coal_rate(&self, q: Quantity, threshold: f64, f: f64, coal_drop: f64) -> MeritResult<f64> {
        let curve = match q {
            Quantity::Emission(e) => &self.coal_emissions[e.index()],
            Quantity::FuelMix(FuelType::Coal) => return Ok(1.0),
            Quantity::FuelConsumption(FuelType::Coal) => self.simple_curve(q),
            _ => return Ok(0.0),
        };
        let drop = (curve.eval(threshold)? - curve.eval(f)?).max(0.0);
        Ok(drop / coal_drop)
    }

    fn simple_curve(&self, q: Quantity) -> &PiecewiseLinear {
        &self.simple[q.index()]
    }

    pub fn bucket(&self) -> usize {
        self.bucket
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    pub fn rows(&self) -> &[MeritRow] {
        &self.rows
    }

    pub fn row(&self, id: &str) -> Option<&MeritRow> {
        self.rows.iter().find(|r| r.id.as_str() == id)
    }

    pub fn total_capacity(&self) -> f64 {
        self.steps.ends()[self.rows.len() - 1]
    }

    /// Cumulative end points of coal units, in merit order.
    pub fn coal_breakpoints(&self) -> Vec<f64> {
        self.rows.iter().filter(|r| r.is_coal()).map(|r| r.f).collect()
    }

    pub fn marginal_index(&self, demand: f64) -> MeritResult<usize> {
        if demand > self.total_capacity() {
            return Err(MeritError::Domain {
                value: demand,
                lower: 0.0,
                upper: self.total_capacity(),
            });
        }
        self.steps.index_at(demand)
    }

    /// The unit setting the margin at `demand`. A unit owns
    /// `[s, f)`, so a boundary belongs to the unit above it.
    pub fn marginal_unit(&self, demand: f64) -> MeritResult<&MeritRow> {
        Ok(&self.rows[self.marginal_index(demand)?])
    }

    pub fn marginal_unit_attribute(&self, demand: f64, field: MarginalField) -> MeritResult<f64> {
        let k = self.marginal_index(demand)?;
        let row = &self.rows[k];
        Ok(match field {
            MarginalField::GenCost => row.gen_cost,
            MarginalField::Capacity => row.capacity,
            MarginalField::MinOutput => row.min_out,
            MarginalField::HeatRate => row.heat_rate,
            MarginalField::FuelPrice => row.fuel_price,
            MarginalField::Vom => row.vom,
            MarginalField::Emission(e) => row.emission(e),
            MarginalField::FullMarginal(q) => self.marginal[q.index()][k],
        })
    }

    /// Running total of `value * capacity`, ignoring minimum output.
    pub fn total_at_demand(&self, demand: f64, q: Quantity) -> MeritResult<f64> {
        self.simple_curve(q).eval(demand)
    }

    /// Total from the base/marginal split.
    ///
    /// With minimum output on, the fuel-mix totals sum to committed MW
    /// (`0.1 * a + 0.9 * s + min_out` plus the marginal share past `s`), which
    /// runs above demand; with it off they sum to demand.
    pub fn full_total_at_demand(&self, demand: f64, q: Quantity) -> MeritResult<f64> {
        self.full[q.index()].eval(demand)
    }

    pub fn full_marginal_at_demand(&self, demand: f64, q: Quantity) -> MeritResult<f64> {
        self.marginal_unit_attribute(demand, MarginalField::FullMarginal(q))
    }

    /// Committed base of row `k` (merit-order position).
    pub fn full_base(&self, k: usize, q: Quantity) -> Option<f64> {
        self.base[q.index()].get(k).copied()
    }

    pub fn full_marginal(&self, k: usize, q: Quantity) -> Option<f64> {
        self.marginal[q.index()].get(k).copied()
    }

    /// Warn once per call site when demand reaches the backstop.
    pub(crate) fn check_backstop(&self, demand: f64, row: &MeritRow) {
        if row.role == UnitRole::Backstop {
            warn!(
                demand,
                capacity = row.s,
                bucket = self.bucket,
                "demand exceeds fleet capacity; backstop is marginal"
            );
        }
    }
}

// Points (0, 0), then (f_k, sum of value * capacity through k).
fn cumulative_curve(rows: &[MeritRow], value: impl Fn(&MeritRow) -> f64) -> MeritResult<PiecewiseLinear> {
    let mut xs = Vec::with_capacity(rows.len() + 1);
    let mut ys = Vec::with_capacity(rows.len() + 1);
    xs.push(0.0);
    ys.push(0.0);
    let mut total = 0.0;
    for row in rows {
        total += value(row) * row.capacity;
        xs.push(row.f);
        ys.push(total);
    }
    PiecewiseLinear::new(xs, ys, DomainPolicy::Strict)
}
