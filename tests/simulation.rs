use holocene::{
    engine::{Engine, EngineBuilder, EngineSettings},
    persistence::SavedWorld,
    report::Occurrence,
    rng::RngOffset,
    scenario::{Scenario, ScenarioLoader},
    world::World,
};

fn scenario(file: &str) -> Scenario {
    ScenarioLoader::new(".")
        .load(file)
        .expect("scenario should load")
}

fn engine(name: &str) -> Engine {
    EngineBuilder::new(EngineSettings::new(name))
        .with_standard_passes()
        .build()
}

fn fingerprint(world: &World) -> serde_json::Value {
    let mut saved = SavedWorld::capture(world);
    saved.saved_at = Default::default();
    serde_json::to_value(saved).expect("serialize")
}

#[test]
fn same_seed_same_history() {
    let scenario = scenario("scenarios/river_valley.yaml");
    let mut a = scenario.build_world().expect("world a");
    let mut b = scenario.build_world().expect("world b");

    engine("a").run(&mut a, 150).expect("run a");
    engine("b").run(&mut b, 150).expect("run b");

    assert_eq!(a.current_date(), b.current_date());
    assert_eq!(fingerprint(&a), fingerprint(&b));
}

#[test]
fn world_invariants_hold_every_tick() {
    let scenario = scenario("scenarios/river_valley.yaml");
    let mut world = scenario.build_world().expect("world");
    let mut engine = engine("invariants");
    let mut last_date = world.current_date();

    for _ in 0..250 {
        let report = engine.tick(&mut world).expect("tick");
        assert!(report.span >= 0);
        assert!(world.current_date() >= last_date);
        last_date = world.current_date();

        for group in world.groups() {
            assert!(group.population() >= 2, "group {:?} survived extinction", group.id);
            assert!(group.influences.total() <= 1.0 + 1e-5);
            assert_eq!(
                world.group_at(group.cell).map(|g| g.id),
                Some(group.id),
                "cell occupancy out of sync"
            );
            for (_, neighbor) in group.neighbors() {
                let back = world
                    .group(neighbor)
                    .map(|n| n.neighbors().any(|(_, id)| id == group.id))
                    .unwrap_or(false);
                assert!(back, "neighbour link is one-way");
            }
            for influence in group.influences.iter() {
                let polity = world.polity(influence.polity).expect("polity exists");
                assert!(polity.influenced_groups().any(|id| id == group.id));
            }
        }
        for polity in world.polities() {
            assert!(polity.influenced_group_count() > 0);
        }
        if let Some(next) = world.events().peek_date() {
            assert!(next >= world.current_date());
        }
    }
}

#[test]
fn polity_count_matches_formations_and_dissolutions() {
    let scenario = scenario("scenarios/river_valley.yaml");
    let mut world = scenario.build_world().expect("world");
    let mut polities = 0usize;
    engine("ledger")
        .run_with_hook(&mut world, 300, |report| {
            for occurrence in &report.occurrences {
                match occurrence {
                    Occurrence::TribeFormed { .. } => polities += 1,
                    Occurrence::PolityDissolved { .. } => polities -= 1,
                    _ => {}
                }
            }
            assert_eq!(report.polity_count, polities);
        })
        .expect("run");

    assert!(world.current_date() > 0);
    assert!(world.total_population() > 0);
}

#[test]
fn rng_counters_stay_bounded_over_a_long_run() {
    let scenario = scenario("scenarios/river_valley.yaml");
    let cells = (scenario.terrain.width * scenario.terrain.height) as usize;
    let mut world = scenario.build_world().expect("world");
    let mut engine = engine("counters");

    for _ in 0..6 {
        engine.run(&mut world, 200).expect("run");
        let live: Vec<u64> = world.polities().map(|p| p.id.raw()).collect();
        let counters = SavedWorld::capture(&world).rng_counters;

        for counter in &counters {
            assert!(!counter.offset.is_single_use(), "event draw kept a counter");
            if let RngOffset::SetPolityUpdate(id) | RngOffset::PolityUpdateEffects(id) =
                counter.offset
            {
                assert!(live.contains(&id), "counter outlived polity {id}");
            }
        }
        assert!(counters.len() <= cells * (16 + 2 * live.len()));
    }
}

#[test]
fn run_frame_returns_at_least_one_report() {
    let scenario = scenario("scenarios/archipelago.yaml");
    let mut world = scenario.build_world().expect("world");
    let reports = engine("frame")
        .run_frame(&mut world, std::time::Duration::ZERO)
        .expect("frame");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].tick, 1);
}
