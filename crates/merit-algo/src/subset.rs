//! Emissions attributable to a geographic subset of the fleet.
//!
//! Marginal rates of units outside the subset are zeroed and the committed
//! base is rebuilt from increments that follow subset units only. Rows that
//! can never matter are dropped, and units outside the subset that follow a
//! subset unit carry that unit's total forward as a flat segment.

use merit_core::{Emission, MeritResult, Quantity, UnitRole};

use crate::curve::{DomainPolicy, PiecewiseLinear};
use crate::merit_order::MeritOrder;

/// Per-species totals for units located in `states`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetCurves {
    states: Vec<String>,
    curves: Vec<PiecewiseLinear>,
}

impl SubsetCurves {
    /// `None` when no regular unit of `order` sits in `states`.
    pub fn build(order: &MeritOrder, states: &[String]) -> MeritResult<Option<Self>> {
        let rows = order.rows();
        let in_subset: Vec<bool> = rows
            .iter()
            .map(|r| !r.role.is_sentinel() && r.in_states(states))
            .collect();
        if !in_subset.iter().any(|&m| m) {
            return Ok(None);
        }

        let keep: Vec<usize> = (0..rows.len())
            .filter(|&k| {
                matches!(rows[k].role, UnitRole::CoalFloor | UnitRole::GasFloor)
                    || in_subset[k]
                    || in_subset.get(k + 1).copied().unwrap_or(false)
            })
            .collect();

        let mut curves = Vec::with_capacity(Emission::ALL.len());
        for e in Emission::ALL {
            let q = Quantity::Emission(e);
            let mut marginal = Vec::with_capacity(rows.len());
            let mut base = Vec::with_capacity(rows.len());
            let mut running = 0.0;
            let mut previous = 0.0;
            for k in 0..rows.len() {
                let b = order.full_base(k, q).unwrap_or(0.0);
                if k > 0 && in_subset[k - 1] {
                    running += b - previous;
                }
                previous = b;
                base.push(running);
                marginal.push(if in_subset[k] {
                    order.full_marginal(k, q).unwrap_or(0.0)
                } else {
                    0.0
                });
            }

            for pair in keep.windows(2) {
                let (p, c) = (pair[0], pair[1]);
                if in_subset[p] && !in_subset[c] {
                    base[c] = base[p] + marginal[p] * (rows[p].f - rows[p].s);
                }
            }

            let xs = keep.iter().map(|&k| rows[k].f).collect();
            let ys = keep
                .iter()
                .map(|&k| base[k] + (rows[k].f - rows[k].s) * marginal[k])
                .collect();
            curves.push(PiecewiseLinear::new(xs, ys, DomainPolicy::Clamp)?);
        }

        Ok(Some(Self {
            states: states.to_vec(),
            curves,
        }))
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// Subset emissions at `demand`, clamped outside the kept rows.
    pub fn total_at_demand(&self, demand: f64, species: Emission) -> MeritResult<f64> {
        self.curves[species.index()].eval(demand)
    }
}
