use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use polars::prelude::DataFrame;

use merit_core::{DemandPoint, MeritError, MinDowntimeEvent};

use crate::{f64_column, has_column, read_frame, str_column};

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| anyhow!("unrecognised timestamp '{value}'"))
}

pub fn load_demand_series(path: &Path) -> Result<Vec<DemandPoint>> {
    let df = read_frame(path)?;
    demand_series_from_frame(&df)
        .with_context(|| format!("loading demand series '{}'", path.display()))
}

/// Hourly demand from `datetime` and `demand` columns.
///
/// Null demand cells are kept as missing hours; the solver decides whether
/// they are fatal.
pub fn demand_series_from_frame(df: &DataFrame) -> Result<Vec<DemandPoint>> {
    let ts_column = if has_column(df, "datetime") {
        "datetime"
    } else {
        "timestamp"
    };
    let stamps = str_column(df, ts_column)?;
    let demand = f64_column(df, "demand")?;

    let mut points = Vec::with_capacity(stamps.len());
    for (row, (stamp, value)) in stamps.into_iter().zip(demand).enumerate() {
        let stamp = stamp
            .ok_or_else(|| MeritError::Validation(format!("demand row {row} has no timestamp")))?;
        points.push(DemandPoint {
            timestamp: parse_timestamp(&stamp)?,
            demand: value,
        });
    }
    points.sort_by_key(|p| p.timestamp);
    Ok(points)
}

pub fn load_min_downtime_events(path: &Path) -> Result<Vec<MinDowntimeEvent>> {
    let df = read_frame(path)?;
    events_from_frame(&df).with_context(|| format!("loading events '{}'", path.display()))
}

/// Events from `start`, `end` and `demand_threshold` columns.
pub fn events_from_frame(df: &DataFrame) -> Result<Vec<MinDowntimeEvent>> {
    let starts = str_column(df, "start")?;
    let ends = str_column(df, "end")?;
    let thresholds = f64_column(df, "demand_threshold")?;

    let mut events = Vec::with_capacity(starts.len());
    for row in 0..starts.len() {
        let missing = |what: &str| MeritError::Validation(format!("event row {row} has no {what}"));
        let start = parse_timestamp(starts[row].as_deref().ok_or_else(|| missing("start"))?)?;
        let end = parse_timestamp(ends[row].as_deref().ok_or_else(|| missing("end"))?)?;
        let demand_threshold = thresholds[row].ok_or_else(|| missing("demand_threshold"))?;
        if end <= start {
            return Err(MeritError::Validation(format!(
                "event row {row} ends at {end} before it starts at {start}"
            ))
            .into());
        }
        events.push(MinDowntimeEvent {
            start,
            end,
            demand_threshold,
        });
    }
    Ok(events)
}
