use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use merit_algo::{dispatch_frame, persist_dataframe, subset_frame, DispatchSolver, OutputStage};
use merit_cli::cli::DispatchArgs;
use merit_cli::manifest::record_manifest;
use merit_core::Emission;
use merit_io::{load_demand_series, load_generator_table, load_min_downtime_events};
use merit_ts::MinDowntimeDetector;

use super::{display, load_config};

pub fn handle(args: &DispatchArgs) -> Result<()> {
    let start = Instant::now();
    let res = run(args);
    let params = [
        ("generators", display(&args.generators)),
        ("demand", display(&args.demand)),
        (
            "events",
            args.events.as_deref().map(display).unwrap_or_default(),
        ),
        ("detect_events", args.detect_events.to_string()),
        ("config", args.config.as_deref().map(display).unwrap_or_default()),
    ];
    if let Err(err) = record_manifest(&args.out, "dispatch", &params, start, res.is_ok()) {
        eprintln!("Failed to record run manifest: {err}");
    }
    res
}

fn run(args: &DispatchArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let table = load_generator_table(&args.generators)?;
    let demand = load_demand_series(&args.demand)?;
    let events = match &args.events {
        Some(path) => load_min_downtime_events(path)?,
        None if args.detect_events => MinDowntimeDetector::new(config.coal_min_downtime_hours)?
            .detect(&demand)
            .context("detecting minimum-downtime events")?,
        None => Vec::new(),
    };
    info!(
        units = table.len(),
        hours = demand.len(),
        events = events.len(),
        "Dispatching {}",
        args.demand.display()
    );

    let output = DispatchSolver::new(table, demand, events, &config)?.run()?;

    let mut df = dispatch_frame(&output.records)?;
    persist_dataframe(&mut df, &args.out, OutputStage::Dispatch)?;
    println!(
        "Dispatched {} hours to {}",
        output.records.len(),
        args.out.display()
    );
    for species in Emission::ALL {
        let total: f64 = output
            .records
            .iter()
            .map(|r| r.emission_total(species))
            .sum();
        info!(species = species.as_str(), total, "emission total");
        println!("Total {}: {:.1} kg", species.as_str().to_uppercase(), total);
    }

    if let (Some(path), Some(records)) = (&args.subset_out, &output.subset) {
        let mut df = subset_frame(records)?;
        persist_dataframe(&mut df, path, OutputStage::Subset)?;
        println!("Wrote subset emissions to {}", path.display());
    }
    Ok(())
}
