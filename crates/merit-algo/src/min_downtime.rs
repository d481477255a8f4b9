//! Coal minimum-downtime overrides.
//!
//! During an event, coal units that would have shut down below the event
//! threshold stay on at minimum output. The override peels each such unit's
//! minimum-output block into the coal floor sentinel, which always ranks first,
//! and leaves the remainder of the unit in the stack with no minimum output of
//! its own.

use std::collections::HashMap;

use merit_core::{
    BucketAttributes, FuelType, GeneratingUnit, GeneratorTable, MeritResult, UnitRole,
};

use crate::merit_order::{BuilderOptions, MeritOrder, MeritOrderBuilder};

/// Smallest coal breakpoint at or above `threshold`; the last one if the
/// threshold is above them all. An empty list leaves the threshold unchanged.
pub fn snap_threshold(breakpoints: &[f64], threshold: f64) -> f64 {
    match breakpoints.last() {
        None => threshold,
        Some(&last) => {
            let i = breakpoints.partition_point(|&b| b < threshold);
            breakpoints.get(i).copied().unwrap_or(last)
        }
    }
}

#[derive(Debug, Default)]
struct FloorAccumulator {
    total: f64,
    heat_rate: f64,
    co2: f64,
    so2: f64,
    nox: f64,
    fuel_price: f64,
    vom: f64,
}

impl FloorAccumulator {
    fn add(&mut self, floor: f64, attrs: &BucketAttributes, vom: f64) {
        self.total += floor;
        self.heat_rate += floor * attrs.heat_rate;
        self.co2 += floor * attrs.co2;
        self.so2 += floor * attrs.so2;
        self.nox += floor * attrs.nox;
        self.fuel_price += floor * attrs.fuel_price;
        self.vom += floor * vom;
    }

    fn finish(&self) -> (BucketAttributes, f64) {
        let w = self.total;
        (
            BucketAttributes {
                capacity_mw: w,
                heat_rate: self.heat_rate / w,
                co2: self.co2 / w,
                so2: self.so2 / w,
                nox: self.nox / w,
                fuel_price: self.fuel_price / w,
            },
            self.vom / w,
        )
    }
}

impl MeritOrderBuilder {
    /// A builder for the same bucket in which every regular coal unit ending
    /// at or below `threshold` in `order` is held at minimum output.
    ///
    /// The returned builder carries `threshold` in its options so the built
    /// order blends emission and fuel marginals against the forced-on coal.
    pub fn min_downtime_override(&self, order: &MeritOrder, threshold: f64) -> MeritResult<Self> {
        let t = order.bucket();
        let mut table: GeneratorTable = self.table().clone();
        let by_id: HashMap<String, usize> = table
            .units
            .iter()
            .enumerate()
            .map(|(i, u)| (u.id.as_str().to_string(), i))
            .collect();

        let contributors: Vec<usize> = order
            .rows()
            .iter()
            .filter(|r| r.role == UnitRole::Regular && r.fuel_type == FuelType::Coal)
            .filter(|r| r.f <= threshold)
            .filter_map(|r| by_id.get(r.id.as_str()).copied())
            .collect();

        let mut acc = FloorAccumulator::default();
        let mut first: Option<(BucketAttributes, f64)> = None;
        for &i in &contributors {
            let unit = &mut table.units[i];
            let fraction = unit.min_out_fraction;
            let vom = unit.vom;
            let attrs = unit.bucket_mut(t)?;
            let floor = attrs.capacity_mw * fraction;
            if first.is_none() {
                first = Some((*attrs, vom));
            }
            acc.add(floor, attrs, vom);
            attrs.capacity_mw -= floor;
            unit.min_out_fraction = 0.0;
        }

        let (floor_attrs, floor_vom) = if acc.total > 0.0 {
            acc.finish()
        } else {
            let (attrs, vom) = first.unwrap_or_default();
            (
                BucketAttributes {
                    capacity_mw: 1.0,
                    ..attrs
                },
                vom,
            )
        };

        let floor_index = match table.units.iter().position(|u| u.role == UnitRole::CoalFloor) {
            Some(i) => i,
            None => {
                let count = table.bucket_count();
                table
                    .units
                    .insert(0, GeneratingUnit::sentinel(UnitRole::CoalFloor, count));
                0
            }
        };
        let floor_unit = &mut table.units[floor_index];
        *floor_unit.bucket_mut(t)? = floor_attrs;
        floor_unit.vom = floor_vom;
        floor_unit.min_out_fraction = 0.0;

        let options = BuilderOptions {
            coal_mdt_demand_threshold: threshold,
            ..*self.options()
        };
        Self::from_parts(table, *self.adjustments(), options, t)
    }
}
