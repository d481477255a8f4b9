use merit_algo::test_utils::flat_unit;
use merit_algo::{snap_threshold, BuilderOptions, MeritOrder, MeritOrderBuilder};
use merit_core::{Emission, FuelType, GeneratorTable, Quantity, BACKSTOP_CAPACITY_MW};

fn coal_fleet() -> GeneratorTable {
    GeneratorTable::new(vec![
        flat_unit("coal_a", FuelType::Coal, 100.0, 10.0, 1000.0, 1).with_min_out_fraction(0.4),
        flat_unit("coal_b", FuelType::Coal, 100.0, 15.0, 900.0, 1).with_min_out_fraction(0.5),
        flat_unit("gas", FuelType::Gas, 200.0, 20.0, 400.0, 1).with_min_out_fraction(0.5),
    ])
}

fn index_of(order: &MeritOrder, id: &str) -> usize {
    order
        .rows()
        .iter()
        .position(|r| r.id.as_str() == id)
        .unwrap()
}

#[test]
fn thresholds_snap_to_coal_breakpoints() {
    let builder = MeritOrderBuilder::new(coal_fleet(), BuilderOptions::default()).unwrap();
    let order = builder.build().unwrap();
    let breakpoints = order.coal_breakpoints();
    assert_eq!(breakpoints, vec![0.0, 100.0, 200.0]);
    assert_eq!(snap_threshold(&breakpoints, 150.0), 200.0);
    assert_eq!(snap_threshold(&breakpoints, 100.0), 100.0);
    assert_eq!(snap_threshold(&breakpoints, 350.0), 200.0);
}

#[test]
fn override_moves_minimum_output_into_the_coal_floor() {
    let builder = MeritOrderBuilder::new(coal_fleet(), BuilderOptions::default()).unwrap();
    let order = builder.build().unwrap();
    let overridden = builder
        .min_downtime_override(&order, 200.0)
        .unwrap()
        .build()
        .unwrap();

    let floor = overridden.row("coal_0").unwrap();
    assert!((floor.capacity - 90.0).abs() < 1e-9);
    assert!((floor.fuel_price - (40.0 * 10.0 + 50.0 * 15.0) / 90.0).abs() < 1e-9);
    assert!((floor.co2 - (40.0 * 1000.0 + 50.0 * 900.0) / 90.0).abs() < 1e-9);
    assert!((floor.gen_cost - floor.fuel_price).abs() < 1e-9);

    let coal_a = overridden.row("coal_a").unwrap();
    assert!((coal_a.capacity - 60.0).abs() < 1e-9);
    assert_eq!(coal_a.min_out, 0.0);
    assert!((overridden.row("coal_b").unwrap().capacity - 50.0).abs() < 1e-9);
    assert_eq!(overridden.row("gas").unwrap().capacity, 200.0);

    assert!((overridden.total_capacity() - (400.0 + BACKSTOP_CAPACITY_MW)).abs() < 1e-6);
    assert_eq!(overridden.options().coal_mdt_demand_threshold, 200.0);

    // The source builder is untouched.
    assert_eq!(builder.table().find("coal_a").unwrap().buckets[0].capacity_mw, 100.0);
    assert_eq!(builder.build().unwrap(), order);
}

#[test]
fn override_without_contributors_gets_a_nominal_floor() {
    let builder = MeritOrderBuilder::new(coal_fleet(), BuilderOptions::default()).unwrap();
    let order = builder.build().unwrap();
    let overridden = builder
        .min_downtime_override(&order, 50.0)
        .unwrap()
        .build()
        .unwrap();
    let floor = overridden.row("coal_0").unwrap();
    assert_eq!(floor.capacity, 1.0);
    assert_eq!(overridden.row("coal_a").unwrap().capacity, 100.0);
}

#[test]
fn full_reserve_weight_charges_forced_on_coal_rates() {
    let options = BuilderOptions {
        minimum_downtime_reserve_weight: 1.0,
        ..BuilderOptions::default()
    };
    let builder = MeritOrderBuilder::new(coal_fleet(), options).unwrap();
    let order = builder.build().unwrap();
    let overridden = builder
        .min_downtime_override(&order, 200.0)
        .unwrap()
        .build()
        .unwrap();

    // coal_a ends at 150; coal_b (900 kg/MWh) fills 150..200 below the threshold.
    let k = index_of(&overridden, "coal_a");
    let co2 = overridden
        .full_marginal(k, Quantity::Emission(Emission::Co2))
        .unwrap();
    assert!((co2 - 900.0).abs() < 1e-9);
    let coal_mix = overridden
        .full_marginal(k, Quantity::FuelMix(FuelType::Coal))
        .unwrap();
    assert!((coal_mix - 1.0).abs() < 1e-12);
    let gas_mix = overridden
        .full_marginal(k, Quantity::FuelMix(FuelType::Gas))
        .unwrap();
    assert_eq!(gas_mix, 0.0);
}

#[test]
fn reserve_weight_only_touches_emissions_below_the_threshold() {
    let heavy = BuilderOptions {
        minimum_downtime_reserve_weight: 1.0,
        ..BuilderOptions::default()
    };
    let light = BuilderOptions {
        minimum_downtime_reserve_weight: 0.0,
        ..BuilderOptions::default()
    };
    let build = |options| {
        let builder = MeritOrderBuilder::new(coal_fleet(), options).unwrap();
        let order = builder.build().unwrap();
        builder
            .min_downtime_override(&order, 200.0)
            .unwrap()
            .build()
            .unwrap()
    };
    let (a, b) = (build(heavy), build(light));
    for k in 0..a.rows().len() {
        assert_eq!(
            a.full_marginal(k, Quantity::Cost),
            b.full_marginal(k, Quantity::Cost)
        );
    }
    // gas sits above the threshold in both.
    let gas = index_of(&a, "gas");
    let co2 = Quantity::Emission(Emission::Co2);
    assert_eq!(a.full_marginal(gas, co2), b.full_marginal(gas, co2));
}
