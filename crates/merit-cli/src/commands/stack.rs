use std::time::Instant;

use anyhow::Result;
use tracing::info;

use merit_algo::{merit_order_frame, persist_dataframe, BuilderOptions, MeritOrderBuilder, OutputStage};
use merit_cli::cli::StackArgs;
use merit_cli::manifest::record_manifest;
use merit_io::load_generator_table;

use super::{display, load_config};

pub fn handle(args: &StackArgs) -> Result<()> {
    let start = Instant::now();
    let res = run(args);
    let params = [
        ("generators", display(&args.generators)),
        ("bucket", args.bucket.to_string()),
        ("config", args.config.as_deref().map(display).unwrap_or_default()),
    ];
    if let Err(err) = record_manifest(&args.out, "stack", &params, start, res.is_ok()) {
        eprintln!("Failed to record run manifest: {err}");
    }
    res
}

fn run(args: &StackArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let table = load_generator_table(&args.generators)?;

    let mut builder = MeritOrderBuilder::new(table, BuilderOptions::from(&config))?;
    builder.set_adjustments(config.adjustments)?;
    builder.select_bucket(args.bucket)?;
    let order = builder.build()?;
    info!(bucket = args.bucket, units = order.rows().len(), "Ranked units");

    let mut df = merit_order_frame(&order)?;
    persist_dataframe(&mut df, &args.out, OutputStage::Stack)?;
    println!(
        "Wrote merit order for bucket {} ({} units) to {}",
        args.bucket,
        order.rows().len(),
        args.out.display()
    );
    Ok(())
}
