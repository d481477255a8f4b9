use std::time::Instant;

use anyhow::Result;
use tracing::info;

use merit_algo::{events_frame, persist_dataframe, OutputStage};
use merit_cli::cli::EventsArgs;
use merit_cli::manifest::record_manifest;
use merit_io::load_demand_series;
use merit_ts::MinDowntimeDetector;

use super::display;

pub fn handle(args: &EventsArgs) -> Result<()> {
    let start = Instant::now();
    let res = run(args);
    let params = [
        ("demand", display(&args.demand)),
        ("min_downtime", args.min_downtime.to_string()),
    ];
    if let Err(err) = record_manifest(&args.out, "events", &params, start, res.is_ok()) {
        eprintln!("Failed to record run manifest: {err}");
    }
    res
}

fn run(args: &EventsArgs) -> Result<()> {
    let demand = load_demand_series(&args.demand)?;
    let detector = MinDowntimeDetector::new(args.min_downtime)?;
    info!(hours = demand.len(), window = args.min_downtime, "Scanning demand for troughs");
    let events = detector.detect(&demand)?;

    let mut df = events_frame(&events)?;
    persist_dataframe(&mut df, &args.out, OutputStage::Events)?;
    println!("Detected {} events; wrote {}", events.len(), args.out.display());
    Ok(())
}
