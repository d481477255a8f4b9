use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

// unit, fuel, prime mover, min-out, state, mw, heat rate, co2, fuel price
const UNITS: [(&str, &str, &str, f64, &str, f64, f64, f64, f64); 3] = [
    ("u1", "coal", "st", 0.5, "TX", 100.0, 10.0, 1000.0, 1.0),
    ("u2", "gas", "cc", 0.5, "OK", 50.0, 8.0, 400.0, 2.5),
    ("u3", "oil", "gt", 0.5, "TX", 50.0, 12.0, 800.0, 2.5),
];

fn write_generators(dir: &Path) -> PathBuf {
    let mut header = String::from("unit_id,plant_id,fuel_type,prime_mover,vom,min_out_fraction,state");
    for t in 1..=52 {
        header.push_str(&format!(
            ",mw{t},heat_rate{t},co2{t},so2{t},nox{t},fuel_price{t}"
        ));
    }
    let mut body = header;
    for (id, fuel, pm, frac, state, mw, hr, co2, price) in UNITS {
        body.push('\n');
        body.push_str(&format!("{id},{id},{fuel},{pm},0.0,{frac},{state}"));
        for _ in 1..=52 {
            body.push_str(&format!(",{mw},{hr},{co2},0.0,0.0,{price}"));
        }
    }
    body.push('\n');
    let path = dir.join("generators.csv");
    fs::write(&path, body).unwrap();
    path
}

fn write_demand(dir: &Path, values: &[Option<f64>]) -> PathBuf {
    let mut body = String::from("datetime,demand\n");
    for (i, value) in values.iter().enumerate() {
        let day = 1 + i / 24;
        let hour = i % 24;
        let cell = value.map(|v| v.to_string()).unwrap_or_default();
        body.push_str(&format!("2018-01-{day:02} {hour:02}:00:00,{cell}\n"));
    }
    let path = dir.join("demand.csv");
    fs::write(&path, body).unwrap();
    path
}

fn two_days() -> Vec<Option<f64>> {
    (0..48)
        .map(|i| Some(if i % 2 == 0 { 40.0 } else { 120.0 }))
        .collect()
}

#[test]
fn dispatch_writes_hourly_results() {
    let dir = tempdir().unwrap();
    let generators = write_generators(dir.path());
    let demand = write_demand(dir.path(), &two_days());
    let out = dir.path().join("results").join("dispatch.csv");

    let mut cmd = Command::cargo_bin("merit").unwrap();
    cmd.args([
        "dispatch",
        "--generators",
        generators.to_str().unwrap(),
        "--demand",
        demand.to_str().unwrap(),
        "--buckets",
        "1",
        "--out",
        out.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("Dispatched 48 hours"))
    .stdout(predicate::str::contains("Total CO2:"))
    .stdout(predicate::str::contains("Total NOX:"));

    assert!(out.exists());
    assert!(dir.path().join("results/dispatch/dispatch.csv").exists());
    let text = fs::read_to_string(&out).unwrap();
    let header = text.lines().next().unwrap();
    for column in ["gen_cost_marg", "co2_tot", "coal_mix", "mmbtu_coal", "marg_gen_fuel_type"] {
        assert!(header.contains(column), "missing {column} in {header}");
    }
    assert_eq!(text.lines().count(), 49);
}

#[test]
fn dispatch_with_subset_writes_both_tables() {
    let dir = tempdir().unwrap();
    let generators = write_generators(dir.path());
    let demand = write_demand(dir.path(), &two_days());
    let out = dir.path().join("dispatch.csv");
    let subset = dir.path().join("subset.csv");

    let mut cmd = Command::cargo_bin("merit").unwrap();
    cmd.args([
        "dispatch",
        "--generators",
        generators.to_str().unwrap(),
        "--demand",
        demand.to_str().unwrap(),
        "--co2-tax",
        "0.01",
        "--subset-states",
        "TX",
        "--subset-out",
        subset.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("Wrote subset emissions"));
    let text = fs::read_to_string(&subset).unwrap();
    assert!(text.starts_with("datetime,demand,co2_tot"));
}

#[test]
fn dispatch_reports_missing_demand() {
    let dir = tempdir().unwrap();
    let generators = write_generators(dir.path());
    let mut values = two_days();
    values[7] = None;
    let demand = write_demand(dir.path(), &values);
    let out = dir.path().join("dispatch.csv");

    let mut cmd = Command::cargo_bin("merit").unwrap();
    cmd.args([
        "dispatch",
        "--generators",
        generators.to_str().unwrap(),
        "--demand",
        demand.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Missing demand at 2018-01-01 07:00:00"));
    assert!(!out.exists());
}

#[test]
fn events_detects_troughs() {
    let dir = tempdir().unwrap();
    // Flat at 100 with a two-hour dip to 10 starting at hour 5.
    let mut values: Vec<Option<f64>> = vec![Some(100.0); 24];
    values[5] = Some(10.0);
    values[6] = Some(10.0);
    let demand = write_demand(dir.path(), &values);
    let out = dir.path().join("events.csv");

    let mut cmd = Command::cargo_bin("merit").unwrap();
    cmd.args([
        "events",
        "--demand",
        demand.to_str().unwrap(),
        "--min-downtime",
        "4",
        "--out",
        out.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("Detected"));
    let text = fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("start,end,demand_threshold"));
}

#[test]
fn stack_lists_units_in_merit_order() {
    let dir = tempdir().unwrap();
    let generators = write_generators(dir.path());
    let out = dir.path().join("stack.csv");

    let mut cmd = Command::cargo_bin("merit").unwrap();
    cmd.args([
        "stack",
        "--generators",
        generators.to_str().unwrap(),
        "--bucket",
        "10",
        "--out",
        out.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("bucket 10 (6 units)"));

    let text = fs::read_to_string(&out).unwrap();
    let ids: Vec<&str> = text
        .lines()
        .skip(1)
        .filter_map(|line| line.split(',').next())
        .collect();
    assert_eq!(ids, vec!["coal_0", "ngcc_0", "u1", "u2", "u3", "backstop"]);
}

#[test]
fn stack_rejects_unknown_bucket() {
    let dir = tempdir().unwrap();
    let generators = write_generators(dir.path());
    let out = dir.path().join("stack.csv");

    let mut cmd = Command::cargo_bin("merit").unwrap();
    cmd.args([
        "stack",
        "--generators",
        generators.to_str().unwrap(),
        "--bucket",
        "60",
        "--out",
        out.to_str().unwrap(),
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("bucket 60"));
}
