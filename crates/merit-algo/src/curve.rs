//! Piecewise curves over cumulative demand.
//!
//! Cumulative totals are piecewise linear between unit boundaries; marginal
//! unit lookups are exact steps. Both are built once per merit order and then
//! only read.

use merit_core::{MeritError, MeritResult};

/// What to do with a query outside the breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainPolicy {
    /// Return [`MeritError::Domain`]. Used for full-fleet curves.
    Strict,
    /// Return the nearest boundary value. Used for subset curves.
    Clamp,
}

/// Linear interpolation through `(xs[i], ys[i])`.
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseLinear {
    xs: Vec<f64>,
    ys: Vec<f64>,
    policy: DomainPolicy,
}

impl PiecewiseLinear {
    /// `xs` must be non-decreasing; repeated breakpoints are allowed and the
    /// later point wins at that abscissa.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>, policy: DomainPolicy) -> MeritResult<Self> {
        if xs.is_empty() || xs.len() != ys.len() {
            return Err(MeritError::Validation(format!(
                "curve needs matching non-empty breakpoints ({} x, {} y)",
                xs.len(),
                ys.len()
            )));
        }
        if let Some(i) = xs.iter().chain(&ys).position(|v| !v.is_finite()) {
            return Err(MeritError::Config(format!(
                "curve breakpoint {} is not finite",
                i % xs.len()
            )));
        }
        if let Some(i) = xs.windows(2).position(|w| w[1] < w[0]) {
            return Err(MeritError::Validation(format!(
                "curve breakpoints decrease at position {}: {} -> {}",
                i + 1,
                xs[i],
                xs[i + 1]
            )));
        }
        Ok(Self { xs, ys, policy })
    }

    pub fn lower(&self) -> f64 {
        self.xs[0]
    }

    pub fn upper(&self) -> f64 {
        self.xs[self.xs.len() - 1]
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.xs.iter().copied().zip(self.ys.iter().copied())
    }

    pub fn eval(&self, x: f64) -> MeritResult<f64> {
        let last = self.xs.len() - 1;
        if !(x >= self.lower() && x <= self.upper()) {
            return match self.policy {
                DomainPolicy::Clamp if x < self.lower() => Ok(self.ys[0]),
                DomainPolicy::Clamp if x > self.upper() => Ok(self.ys[last]),
                _ => Err(MeritError::Domain {
                    value: x,
                    lower: self.lower(),
                    upper: self.upper(),
                }),
            };
        }
        // First breakpoint strictly to the right of x.
        let right = self.xs.partition_point(|&v| v <= x);
        if right > last {
            return Ok(self.ys[last]);
        }
        let left = right - 1;
        let (x0, x1) = (self.xs[left], self.xs[right]);
        let (y0, y1) = (self.ys[left], self.ys[right]);
        Ok(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
    }
}

/// Exact step lookup over cumulative end points: position `i` owns
/// `[ends[i-1], ends[i])`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepLookup {
    ends: Vec<f64>,
}

impl StepLookup {
    pub fn new(ends: Vec<f64>) -> MeritResult<Self> {
        if ends.is_empty() {
            return Err(MeritError::Validation("step lookup needs at least one row".into()));
        }
        Ok(Self { ends })
    }

    /// Row that is marginal at `x`. Boundaries belong to the row above them;
    /// queries past the last end resolve to the last row.
    pub fn index_at(&self, x: f64) -> MeritResult<usize> {
        if !x.is_finite() || x < 0.0 {
            return Err(MeritError::Domain {
                value: x,
                lower: 0.0,
                upper: self.ends[self.ends.len() - 1],
            });
        }
        let idx = self.ends.partition_point(|&end| end <= x);
        Ok(idx.min(self.ends.len() - 1))
    }

    pub fn ends(&self) -> &[f64] {
        &self.ends
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(policy: DomainPolicy) -> PiecewiseLinear {
        PiecewiseLinear::new(vec![0.0, 100.0, 150.0], vec![0.0, 1000.0, 2000.0], policy).unwrap()
    }

    #[test]
    fn interpolates_between_breakpoints() {
        let curve = ramp(DomainPolicy::Strict);
        assert_eq!(curve.eval(0.0).unwrap(), 0.0);
        assert!((curve.eval(40.0).unwrap() - 400.0).abs() < 1e-9);
        assert!((curve.eval(120.0).unwrap() - 1400.0).abs() < 1e-9);
        assert_eq!(curve.eval(150.0).unwrap(), 2000.0);
    }

    #[test]
    fn strict_rejects_out_of_domain() {
        let curve = ramp(DomainPolicy::Strict);
        assert!(matches!(curve.eval(-1.0), Err(MeritError::Domain { .. })));
        assert!(matches!(curve.eval(150.5), Err(MeritError::Domain { .. })));
        assert!(curve.eval(f64::NAN).is_err());
    }

    #[test]
    fn clamp_returns_boundary_values() {
        let curve = ramp(DomainPolicy::Clamp);
        assert_eq!(curve.eval(-10.0).unwrap(), 0.0);
        assert_eq!(curve.eval(1.0e9).unwrap(), 2000.0);
    }

    #[test]
    fn repeated_breakpoints_take_the_later_point() {
        let curve = PiecewiseLinear::new(
            vec![0.0, 0.0, 0.0, 10.0],
            vec![0.0, 0.0, 5.0, 15.0],
            DomainPolicy::Strict,
        )
        .unwrap();
        assert_eq!(curve.eval(0.0).unwrap(), 5.0);
        assert_eq!(curve.eval(5.0).unwrap(), 10.0);
    }

    #[test]
    fn rejects_decreasing_or_non_finite_breakpoints() {
        assert!(PiecewiseLinear::new(vec![0.0, 2.0, 1.0], vec![0.0; 3], DomainPolicy::Strict)
            .is_err());
        assert!(matches!(
            PiecewiseLinear::new(vec![0.0, 1.0], vec![0.0, f64::NAN], DomainPolicy::Strict),
            Err(MeritError::Config(_))
        ));
        assert!(PiecewiseLinear::new(vec![], vec![], DomainPolicy::Clamp).is_err());
    }

    #[test]
    fn step_lookup_assigns_boundaries_upward() {
        // Rows: two zero-width sentinels, then 100 MW, 50 MW.
        let steps = StepLookup::new(vec![0.0, 0.0, 100.0, 150.0]).unwrap();
        assert_eq!(steps.index_at(0.0).unwrap(), 2);
        assert_eq!(steps.index_at(99.999).unwrap(), 2);
        assert_eq!(steps.index_at(100.0).unwrap(), 3);
        assert_eq!(steps.index_at(500.0).unwrap(), 3);
        assert!(steps.index_at(-0.5).is_err());
    }
}
