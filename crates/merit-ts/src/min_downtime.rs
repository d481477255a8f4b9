//! Minimum-downtime event detection.
//!
//! Coal units that shut down must stay off for a minimum number of hours, so
//! when demand dips briefly and then recovers they are assumed to hold
//! minimum output through the trough instead. An hour `i` opens such an event
//! when the area by which demand falls below `d[i]` over the following window
//! is a local maximum, demand has recovered by the end of the window, and the
//! window as a whole sits at or below the flat line at `d[i]`.

use chrono::Duration;

use merit_core::{DemandPoint, MeritError, MeritResult, MinDowntimeEvent};

/// Demand at the end of the window must be within this factor of the start.
pub const RECOVERY_RATIO: f64 = 1.05;

#[derive(Debug, Clone, Copy)]
pub struct MinDowntimeDetector {
    window_hours: usize,
}

impl Default for MinDowntimeDetector {
    fn default() -> Self {
        Self { window_hours: 12 }
    }
}

impl MinDowntimeDetector {
    pub fn new(window_hours: u32) -> MeritResult<Self> {
        if window_hours == 0 {
            return Err(MeritError::Config(
                "minimum downtime must be at least one hour".into(),
            ));
        }
        Ok(Self {
            window_hours: window_hours as usize,
        })
    }

    pub fn window_hours(&self) -> usize {
        self.window_hours
    }

    /// Scan an hourly series and emit one event per detected trough.
    pub fn detect(&self, series: &[DemandPoint]) -> MeritResult<Vec<MinDowntimeEvent>> {
        let values = series
            .iter()
            .map(|p| {
                p.value().ok_or_else(|| MeritError::MissingDemand {
                    timestamp: p.timestamp.to_string(),
                })
            })
            .collect::<MeritResult<Vec<f64>>>()?;

        let hours = Duration::hours(self.window_hours as i64);
        Ok(self
            .event_hours(&values)
            .into_iter()
            .map(|i| MinDowntimeEvent {
                start: series[i].timestamp,
                end: series[i].timestamp + hours,
                demand_threshold: values[i],
            })
            .collect())
    }

    /// Indices of hours that open an event.
    pub fn event_hours(&self, values: &[f64]) -> Vec<usize> {
        let n = values.len();
        let w = self.window_hours;
        let convex = self.convex_profile(values);
        let span = w / 2 + 1;

        (0..n)
            .filter(|&i| {
                let Some(forward) = forward_sum(values, i, w) else {
                    return false;
                };
                let flat = values[i] * (w + 1) as f64;
                let Some(peak) = centred_max(&convex, i, span) else {
                    return false;
                };
                convex[i] != 0.0 && convex[i] == peak && flat >= forward
            })
            .collect()
    }

    /// Area below the flat line at `d[i]` over the next window, zeroed when
    /// demand has not recovered by the end of the window. Near the end of the
    /// series, where the window is incomplete, the area is `w * d[i]`.
    pub fn convex_profile(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        let w = self.window_hours;
        (0..n)
            .map(|i| {
                let d = values[i];
                let flat = d * (w + 1) as f64;
                if i + w >= n {
                    return flat - d;
                }
                let below: f64 = values[i..=i + w].iter().map(|v| v.min(d)).sum();
                if d <= RECOVERY_RATIO * values[i + w] {
                    flat - below
                } else {
                    0.0
                }
            })
            .collect()
    }
}

fn forward_sum(values: &[f64], i: usize, w: usize) -> Option<f64> {
    (i + w < values.len()).then(|| values[i..=i + w].iter().sum())
}

// Rolling maximum over `span` samples aligned on `i`; undefined unless the
// whole window lies inside the series.
fn centred_max(values: &[f64], i: usize, span: usize) -> Option<f64> {
    let hi = i + span / 2;
    let lo = (hi + 1).checked_sub(span)?;
    if hi >= values.len() {
        return None;
    }
    values[lo..=hi].iter().copied().reduce(f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn hour(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 4, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(h as i64)
    }

    fn series(values: &[f64]) -> Vec<DemandPoint> {
        values
            .iter()
            .enumerate()
            .map(|(h, v)| DemandPoint::new(hour(h as u32), *v))
            .collect()
    }

    // Flat at 10 with a three-hour dip to 5 starting at hour 6.
    fn dip() -> Vec<f64> {
        let mut values = vec![10.0; 17];
        values[6] = 5.0;
        values[7] = 5.0;
        values[8] = 5.0;
        values
    }

    #[test]
    fn convex_profile_filters_unrecovered_windows() {
        let detector = MinDowntimeDetector::new(4).unwrap();
        let convex = detector.convex_profile(&dip());
        // Windows starting at hours 2-4 end inside the dip.
        assert_eq!(&convex[..6], &[0.0, 0.0, 0.0, 0.0, 0.0, 15.0]);
        assert_eq!(convex[6], 0.0);
        // Incomplete windows at the tail.
        assert_eq!(convex[16], 40.0);
    }

    #[test]
    fn single_trough_yields_one_event() {
        let detector = MinDowntimeDetector::new(4).unwrap();
        let events = detector.detect(&series(&dip())).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start, hour(5));
        assert_eq!(events[0].end, hour(9));
        assert_eq!(events[0].demand_threshold, 10.0);
    }

    #[test]
    fn flat_demand_has_no_events() {
        let detector = MinDowntimeDetector::default();
        assert_eq!(detector.window_hours(), 12);
        let events = detector.detect(&series(&[800.0; 72])).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn missing_hour_is_reported() {
        let mut points = series(&dip());
        points[3].demand = None;
        let err = MinDowntimeDetector::new(4).unwrap().detect(&points).unwrap_err();
        assert!(matches!(err, MeritError::MissingDemand { .. }));
    }

    #[test]
    fn zero_window_is_rejected() {
        assert!(MinDowntimeDetector::new(0).is_err());
    }
}
