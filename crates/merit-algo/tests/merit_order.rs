use merit_algo::test_utils::{flat_unit, three_unit_table};
use merit_algo::{BuilderOptions, MarginalField, MeritOrderBuilder};
use merit_core::{Adjustments, Emission, FuelType, GeneratorTable, MeritError, Quantity, UnitRole};

fn without_min_out() -> BuilderOptions {
    BuilderOptions {
        include_minimum_output: false,
        ..BuilderOptions::default()
    }
}

fn position(order: &merit_algo::MeritOrder, id: &str) -> usize {
    order
        .rows()
        .iter()
        .position(|r| r.id.as_str() == id)
        .unwrap()
}

#[test]
fn three_unit_scenario() {
    let order = MeritOrderBuilder::new(three_unit_table(1), without_min_out())
        .unwrap()
        .build()
        .unwrap();

    let ids: Vec<&str> = order.rows().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["coal_0", "ngcc_0", "u1", "u2", "u3", "backstop"]);

    // 100 MW at $10 plus 20 MW at $20.
    assert!((order.total_at_demand(120.0, Quantity::Cost).unwrap() - 1400.0).abs() < 1e-9);
    assert!((order.full_total_at_demand(120.0, Quantity::Cost).unwrap() - 1400.0).abs() < 1e-9);
    assert_eq!(order.marginal_unit(120.0).unwrap().id.as_str(), "u2");
    assert_eq!(
        order
            .marginal_unit_attribute(120.0, MarginalField::GenCost)
            .unwrap(),
        20.0
    );

    // Inside the first unit: nothing committed before it.
    let u1 = position(&order, "u1");
    assert_eq!(order.full_base(u1, Quantity::Cost), Some(0.0));
    assert_eq!(order.full_marginal(u1, Quantity::Cost), Some(10.0));
    assert!((order.full_total_at_demand(40.0, Quantity::Cost).unwrap() - 400.0).abs() < 1e-9);
    assert_eq!(order.marginal_unit(40.0).unwrap().id.as_str(), "u1");
}

#[test]
fn minimum_output_split_by_hand() {
    let order = MeritOrderBuilder::new(three_unit_table(1), BuilderOptions::default())
        .unwrap()
        .build()
        .unwrap();

    // u1: s = 0, anchor clipped to 1 MW, 50 MW minimum output.
    let u1 = position(&order, "u1");
    let row = &order.rows()[u1];
    assert_eq!(row.a, 1.0);
    assert_eq!(row.min_out, 50.0);
    let base = order.full_base(u1, Quantity::Cost).unwrap();
    assert!((base - (0.1 * 10.0 + 0.9 * 0.0 + 10.0 * 50.0)).abs() < 1e-9);

    // u2: s = 100, a = 1, C(1) = 10, C(100) = 1000, slope 10, share 0.5.
    let u2 = position(&order, "u2");
    let base = order.full_base(u2, Quantity::Cost).unwrap();
    assert!((base - (0.1 * 10.0 + 0.9 * 1000.0 + 20.0 * 25.0)).abs() < 1e-9);
    let marg = order.full_marginal(u2, Quantity::Cost).unwrap();
    assert!((marg - (10.0 * 0.5 + 20.0 * 0.5)).abs() < 1e-9);
}

#[test]
fn boundary_demand_belongs_to_the_unit_above() {
    let order = MeritOrderBuilder::new(three_unit_table(1), without_min_out())
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(order.marginal_unit(100.0).unwrap().id.as_str(), "u2");
    assert_eq!(order.marginal_unit(0.0).unwrap().id.as_str(), "u1");
    assert_eq!(order.marginal_unit(149.999).unwrap().id.as_str(), "u2");
}

#[test]
fn demand_past_the_fleet_hits_the_backstop() {
    let order = MeritOrderBuilder::new(three_unit_table(1), without_min_out())
        .unwrap()
        .build()
        .unwrap();
    let row = order.marginal_unit(250.0).unwrap();
    assert_eq!(row.role, UnitRole::Backstop);
    assert_eq!(row.gen_cost, 30.0);
    assert!(matches!(
        order.total_at_demand(-1.0, Quantity::Cost),
        Err(MeritError::Domain { .. })
    ));
}

#[test]
fn simple_curves_never_decrease() {
    let order = MeritOrderBuilder::new(three_unit_table(1), BuilderOptions::default())
        .unwrap()
        .build()
        .unwrap();
    for q in Quantity::all() {
        let mut previous = f64::NEG_INFINITY;
        for step in 0..=60 {
            let demand = step as f64 * 5.0;
            let value = order.total_at_demand(demand, q).unwrap();
            assert!(value >= previous, "{} decreased at {demand}", q.label());
            previous = value;
        }
    }
}

#[test]
fn full_totals_match_simple_totals_without_minimum_output() {
    let order = MeritOrderBuilder::new(three_unit_table(1), without_min_out())
        .unwrap()
        .build()
        .unwrap();
    for q in Quantity::all() {
        for row in order.rows().iter().filter(|r| r.role == UnitRole::Regular) {
            let full = order.full_total_at_demand(row.f, q).unwrap();
            let simple = order.total_at_demand(row.f, q).unwrap();
            assert!((full - simple).abs() < 1e-6, "{} at {}", q.label(), row.f);
        }
    }
    let coal = order
        .full_total_at_demand(120.0, Quantity::FuelMix(FuelType::Coal))
        .unwrap();
    let gas = order
        .full_total_at_demand(120.0, Quantity::FuelMix(FuelType::Gas))
        .unwrap();
    assert!((coal - 100.0).abs() < 1e-9);
    assert!((gas - 20.0).abs() < 1e-9);
}

#[test]
fn rebuilding_is_deterministic() {
    let builder = MeritOrderBuilder::new(three_unit_table(3), BuilderOptions::default()).unwrap();
    assert_eq!(builder.build().unwrap(), builder.build().unwrap());
}

#[test]
fn coal_derate_shrinks_coal_and_does_not_leak() {
    let mut builder = MeritOrderBuilder::new(three_unit_table(1), without_min_out()).unwrap();
    let baseline = builder.build().unwrap();

    builder
        .set_adjustments(Adjustments {
            coal_capacity_derate: 0.2,
            ..Adjustments::default()
        })
        .unwrap();
    let derated = builder.build().unwrap();
    assert_eq!(derated.row("u1").unwrap().capacity, 80.0);
    assert_eq!(derated.row("u2").unwrap().s, 80.0);
    assert_eq!(derated.marginal_unit(90.0).unwrap().id.as_str(), "u2");

    builder.set_adjustments(Adjustments::default()).unwrap();
    assert_eq!(builder.build().unwrap(), baseline);
}

#[test]
fn ties_keep_input_order() {
    let table = GeneratorTable::new(vec![
        flat_unit("second", FuelType::Gas, 10.0, 20.0, 0.0, 1),
        flat_unit("first", FuelType::Gas, 10.0, 20.0, 0.0, 1),
    ]);
    let order = MeritOrderBuilder::new(table, BuilderOptions::default())
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(order.rows()[2].id.as_str(), "second");
    assert_eq!(order.rows()[3].id.as_str(), "first");
}

#[test]
fn buckets_select_their_own_attributes() {
    let mut table = three_unit_table(2);
    table.units[0].buckets[1].capacity_mw = 40.0;
    let mut builder = MeritOrderBuilder::new(table, without_min_out()).unwrap();
    builder.select_bucket(2).unwrap();
    let order = builder.build().unwrap();
    assert_eq!(order.bucket(), 2);
    assert_eq!(order.marginal_unit(50.0).unwrap().id.as_str(), "u2");
    let co2 = order
        .full_total_at_demand(40.0, Quantity::Emission(Emission::Co2))
        .unwrap();
    assert!((co2 - 40_000.0).abs() < 1e-6);
}

#[test]
fn committed_base_plus_marginal_output_at_120_mw() {
    // u2 has no minimum output, so its anchor sits on s and the base is
    // exactly u1 fully committed.
    let table = GeneratorTable::new(vec![
        flat_unit("u1", FuelType::Coal, 100.0, 10.0, 1000.0, 1).with_min_out_fraction(0.5),
        flat_unit("u2", FuelType::Gas, 50.0, 20.0, 400.0, 1),
        flat_unit("u3", FuelType::Oil, 100_000.0, 30.0, 800.0, 1),
    ]);
    let order = MeritOrderBuilder::new(table, BuilderOptions::default())
        .unwrap()
        .build()
        .unwrap();

    let k = order.marginal_index(120.0).unwrap();
    let row = &order.rows()[k];
    assert_eq!(row.id.as_str(), "u2");
    let base = order.full_base(k, Quantity::Cost).unwrap();
    let marg = order.full_marginal(k, Quantity::Cost).unwrap();
    assert!((base - 1000.0).abs() < 1e-9);
    assert!((marg - 20.0).abs() < 1e-12);
    assert!((base + (120.0 - row.s) * marg - 1400.0).abs() < 1e-9);

    let co2_base = order
        .full_base(k, Quantity::Emission(Emission::Co2))
        .unwrap();
    assert!((co2_base - 100.0 * 1000.0).abs() < 1e-6);
    let coal_base = order.full_base(k, Quantity::FuelMix(FuelType::Coal)).unwrap();
    assert!((coal_base - 100.0).abs() < 1e-9);
}

#[test]
fn fuel_mix_sums_to_demand() {
    let mut table = three_unit_table(1);
    table
        .units
        .push(flat_unit("peaker", FuelType::Gas, 30.0, 0.5, 0.0, 1));
    let order = MeritOrderBuilder::new(table, without_min_out())
        .unwrap()
        .build()
        .unwrap();
    for demand in [0.0, 15.0, 30.0, 75.5, 130.0, 180.0, 229.0] {
        let total: f64 = FuelType::ALL
            .iter()
            .map(|&fuel| {
                order
                    .full_total_at_demand(demand, Quantity::FuelMix(fuel))
                    .unwrap()
            })
            .sum();
        assert!((total - demand).abs() < 1e-9, "{total} at {demand}");
        assert!(total <= order.total_capacity());
    }
}

#[test]
fn fuel_mix_sums_to_committed_output_with_minimum_output() {
    let order = MeritOrderBuilder::new(three_unit_table(1), BuilderOptions::default())
        .unwrap()
        .build()
        .unwrap();
    let fuel_sum =
        |f: &dyn Fn(FuelType) -> f64| FuelType::ALL.iter().map(|&fuel| f(fuel)).sum::<f64>();

    // Each row commits 0.1 * a + 0.9 * s + min_out before its own capacity.
    for (k, row) in order.rows().iter().enumerate() {
        let anchor = (row.s - 10.0 * row.min_out).max(1.0);
        let base = fuel_sum(&|fuel| order.full_base(k, Quantity::FuelMix(fuel)).unwrap());
        let expected = 0.1 * anchor + 0.9 * row.s + row.min_out;
        assert!((base - expected).abs() < 1e-9, "{} base {base}", row.id.as_str());
    }

    // u1 base 0.1 + 0 + 50 = 50.1, ends at 150.1; u2 115.1 to 165.1;
    // u3 160.1 to 210.1. The curve interpolates between those ends.
    for (demand, committed) in [(0.0, 0.1), (25.0, 37.6), (100.0, 150.1), (175.0, 187.6)] {
        let total = fuel_sum(&|fuel| {
            order
                .full_total_at_demand(demand, Quantity::FuelMix(fuel))
                .unwrap()
        });
        assert!((total - committed).abs() < 1e-9, "{total} at {demand}");
        assert!(total >= demand);
        assert!(total <= order.total_capacity());
    }
}
