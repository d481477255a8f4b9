//! Hourly dispatch over a year of demand.
//!
//! For each simulated bucket the solver builds one merit order, evaluates
//! every hour inside the bucket window against it, then re-evaluates hours
//! covered by minimum-downtime events against override orders. Hours are
//! independent once their order is built, so both passes fan out with rayon.

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use merit_core::{
    DemandPoint, DispatchConfig, Emission, FuelMap, FuelType, GeneratorTable, MeritError,
    MeritResult, MinDowntimeEvent, Quantity, UnitId,
};
use merit_ts::BucketCalendar;

use crate::merit_order::{BuilderOptions, MarginalField, MeritOrder, MeritOrderBuilder};
use crate::min_downtime::snap_threshold;
use crate::subset::SubsetCurves;

/// Dispatch outcome for one hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRecord {
    pub timestamp: NaiveDateTime,
    pub bucket: usize,
    pub demand: f64,
    pub gen_cost_marg: f64,
    pub gen_cost_tot: f64,
    pub co2_marg: f64,
    pub co2_tot: f64,
    pub so2_marg: f64,
    pub so2_tot: f64,
    pub nox_marg: f64,
    pub nox_tot: f64,
    /// MW from each fuel
    pub fuel_mix: FuelMap<f64>,
    pub coal_mix_marg: f64,
    /// MMBtu burned by each fuel
    pub fuel_consumption: FuelMap<f64>,
    pub marginal_unit: UnitId,
    pub marginal_fuel: FuelType,
    /// Snapped threshold when the hour was dispatched under an event
    pub min_downtime_threshold: Option<f64>,
}

impl DispatchRecord {
    pub fn emission_total(&self, species: Emission) -> f64 {
        match species {
            Emission::Co2 => self.co2_tot,
            Emission::So2 => self.so2_tot,
            Emission::Nox => self.nox_tot,
        }
    }
}

/// Emissions of the geographic subset for one hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsetRecord {
    pub timestamp: NaiveDateTime,
    pub demand: f64,
    pub co2_tot: f64,
    pub so2_tot: f64,
    pub nox_tot: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DispatchOutput {
    /// One record per dispatched hour, in timestamp order
    pub records: Vec<DispatchRecord>,
    /// Present when subset states were configured
    pub subset: Option<Vec<SubsetRecord>>,
}

/// Drives a [`MeritOrderBuilder`] across buckets and hours.
#[derive(Debug, Clone)]
pub struct DispatchSolver {
    builder: MeritOrderBuilder,
    demand: Vec<DemandPoint>,
    events: Vec<MinDowntimeEvent>,
    buckets: Vec<usize>,
    subset_states: Vec<String>,
    calendar: BucketCalendar,
}

impl DispatchSolver {
    pub fn new(
        table: GeneratorTable,
        mut demand: Vec<DemandPoint>,
        events: Vec<MinDowntimeEvent>,
        config: &DispatchConfig,
    ) -> MeritResult<Self> {
        config.validate()?;
        let first = demand
            .iter()
            .map(|p| p.timestamp)
            .min()
            .ok_or_else(|| MeritError::Validation("demand series is empty".into()))?;
        demand.sort_by_key(|p| p.timestamp);

        let mut builder = MeritOrderBuilder::new(table, BuilderOptions::from(config))?;
        builder.set_adjustments(config.adjustments)?;

        let calendar = match config.year {
            Some(year) => BucketCalendar::new(year)?,
            None => BucketCalendar::for_timestamp(first)?,
        };
        Ok(Self {
            builder,
            demand,
            events,
            buckets: config.buckets.clone(),
            subset_states: config.subset_states.clone(),
            calendar,
        })
    }

    pub fn builder(&self) -> &MeritOrderBuilder {
        &self.builder
    }

    pub fn calendar(&self) -> &BucketCalendar {
        &self.calendar
    }

    pub fn run(&mut self) -> MeritResult<DispatchOutput> {
        self.check_demand()?;
        let n = self.demand.len();
        let mut records: Vec<Option<DispatchRecord>> = vec![None; n];
        let mut subset: Option<Vec<Option<SubsetRecord>>> =
            (!self.subset_states.is_empty()).then(|| vec![None; n]);

        for t in self.buckets.clone() {
            let window = self.calendar.window(t)?;
            self.builder.select_bucket(t)?;
            let order = self.builder.build()?;
            let hours = self.hour_range(window.start, window.end);
            info!(bucket = t, hours = hours.len(), start = %window.start, "dispatching bucket");

            let curves = self.subset_curves(&order)?;
            self.evaluate_into(
                &order,
                curves.as_ref(),
                hours,
                None,
                &mut records,
                subset.as_deref_mut(),
            )?;

            let breakpoints = order.coal_breakpoints();
            let clipped: Vec<(NaiveDateTime, NaiveDateTime, f64)> = self
                .events
                .iter()
                .filter_map(|e| {
                    e.clip(window.start, window.end)
                        .map(|(lo, hi)| (lo, hi, snap_threshold(&breakpoints, e.demand_threshold)))
                })
                .collect();
            if clipped.is_empty() {
                continue;
            }

            let mut thresholds: Vec<f64> = clipped.iter().map(|c| c.2).collect();
            thresholds.sort_by(f64::total_cmp);
            thresholds.dedup_by(|a, b| a.to_bits() == b.to_bits());
            debug!(bucket = t, events = clipped.len(), overrides = thresholds.len(), "building overrides");

            let builder = &self.builder;
            let overrides = thresholds
                .par_iter()
                .map(|&thr| {
                    let order = builder.min_downtime_override(&order, thr)?.build()?;
                    let curves = self.subset_curves(&order)?;
                    Ok::<_, MeritError>((order, curves))
                })
                .collect::<MeritResult<Vec<(MeritOrder, Option<SubsetCurves>)>>>()?;

            for (lo, hi, thr) in clipped {
                let k = thresholds.partition_point(|v| v.total_cmp(&thr).is_lt());
                let (order, curves) = &overrides[k];
                let hours = self.hour_range(lo, hi);
                self.evaluate_into(
                    order,
                    curves.as_ref(),
                    hours,
                    Some(thr),
                    &mut records,
                    subset.as_deref_mut(),
                )?;
            }
        }

        let skipped = records.iter().filter(|r| r.is_none()).count();
        if skipped > 0 {
            warn!(skipped, "demand hours fall outside every simulated bucket");
        }
        Ok(DispatchOutput {
            records: records.into_iter().flatten().collect(),
            subset: subset.map(|s| s.into_iter().flatten().collect()),
        })
    }

    fn check_demand(&self) -> MeritResult<()> {
        for point in &self.demand {
            match point.value() {
                None => {
                    return Err(MeritError::MissingDemand {
                        timestamp: point.timestamp.to_string(),
                    })
                }
                Some(d) if d < 0.0 => {
                    return Err(MeritError::Validation(format!(
                        "negative demand {d} at {}",
                        point.timestamp
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    // Indices of hours in [start, end); demand is sorted.
    fn hour_range(&self, start: NaiveDateTime, end: NaiveDateTime) -> std::ops::Range<usize> {
        let lo = self.demand.partition_point(|p| p.timestamp < start);
        let hi = self.demand.partition_point(|p| p.timestamp < end);
        lo..hi.max(lo)
    }

    // Subset curves for `order`, when subset states are configured.
    fn subset_curves(&self, order: &MeritOrder) -> MeritResult<Option<SubsetCurves>> {
        if self.subset_states.is_empty() {
            return Ok(None);
        }
        let curves = SubsetCurves::build(order, &self.subset_states)?;
        match &curves {
            Some(c) => debug!(bucket = order.bucket(), states = ?c.states(), "built subset curves"),
            None => debug!(bucket = order.bucket(), "no units in subset states"),
        }
        Ok(curves)
    }

    fn evaluate_into(
        &self,
        order: &MeritOrder,
        curves: Option<&SubsetCurves>,
        hours: std::ops::Range<usize>,
        threshold: Option<f64>,
        records: &mut [Option<DispatchRecord>],
        subset: Option<&mut [Option<SubsetRecord>]>,
    ) -> MeritResult<()> {
        let start = hours.start;
        let points = &self.demand[hours];
        let evaluated = points
            .par_iter()
            .map(|p| evaluate_hour(order, p, threshold))
            .collect::<MeritResult<Vec<_>>>()?;
        for (i, record) in evaluated.into_iter().enumerate() {
            records[start + i] = Some(record);
        }

        if let Some(out) = subset {
            if let Some(curves) = curves {
                let evaluated = points
                    .par_iter()
                    .map(|p| evaluate_subset(&curves, p))
                    .collect::<MeritResult<Vec<_>>>()?;
                for (i, record) in evaluated.into_iter().enumerate() {
                    out[start + i] = Some(record);
                }
            } else {
                for (i, p) in points.iter().enumerate() {
                    out[start + i] = Some(SubsetRecord {
                        timestamp: p.timestamp,
                        demand: p.value().unwrap_or(0.0),
                        co2_tot: 0.0,
                        so2_tot: 0.0,
                        nox_tot: 0.0,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Dispatch one hour against a built order.
pub fn evaluate_hour(
    order: &MeritOrder,
    point: &DemandPoint,
    threshold: Option<f64>,
) -> MeritResult<DispatchRecord> {
    let demand = point.value().ok_or_else(|| MeritError::MissingDemand {
        timestamp: point.timestamp.to_string(),
    })?;
    let unit = order.marginal_unit(demand)?;
    order.check_backstop(demand, unit);

    let total = |q| order.full_total_at_demand(demand, q);
    let marginal = |q| order.full_marginal_at_demand(demand, q);

    let mut fuel_mix = FuelMap::splat(0.0);
    let mut fuel_consumption = FuelMap::splat(0.0);
    for fuel in FuelType::ALL {
        fuel_mix[fuel] = total(Quantity::FuelMix(fuel))?;
        fuel_consumption[fuel] = total(Quantity::FuelConsumption(fuel))?;
    }

    Ok(DispatchRecord {
        timestamp: point.timestamp,
        bucket: order.bucket(),
        demand,
        gen_cost_marg: order.marginal_unit_attribute(demand, MarginalField::GenCost)?,
        gen_cost_tot: total(Quantity::Cost)?,
        co2_marg: marginal(Quantity::Emission(Emission::Co2))?,
        co2_tot: total(Quantity::Emission(Emission::Co2))?,
        so2_marg: marginal(Quantity::Emission(Emission::So2))?,
        so2_tot: total(Quantity::Emission(Emission::So2))?,
        nox_marg: marginal(Quantity::Emission(Emission::Nox))?,
        nox_tot: total(Quantity::Emission(Emission::Nox))?,
        fuel_mix,
        coal_mix_marg: marginal(Quantity::FuelMix(FuelType::Coal))?,
        fuel_consumption,
        marginal_unit: unit.id.clone(),
        marginal_fuel: unit.fuel_type,
        min_downtime_threshold: threshold,
    })
}

fn evaluate_subset(curves: &SubsetCurves, point: &DemandPoint) -> MeritResult<SubsetRecord> {
    let demand = point.value().unwrap_or(0.0);
    Ok(SubsetRecord {
        timestamp: point.timestamp,
        demand,
        co2_tot: curves.total_at_demand(demand, Emission::Co2)?,
        so2_tot: curves.total_at_demand(demand, Emission::So2)?,
        nox_tot: curves.total_at_demand(demand, Emission::Nox)?,
    })
}
