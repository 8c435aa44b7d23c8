use holocene::{
    engine::{EngineBuilder, EngineSettings},
    persistence::{load_world, save_world, SavedWorld},
    scenario::ScenarioLoader,
    world::World,
};
use tempfile::tempdir;

fn fingerprint(world: &World) -> serde_json::Value {
    let mut saved = SavedWorld::capture(world);
    saved.saved_at = Default::default();
    serde_json::to_value(saved).expect("serialize")
}

#[test]
fn reloaded_world_continues_identically() {
    let scenario = ScenarioLoader::new(".")
        .load("scenarios/river_valley.yaml")
        .expect("scenario should load");
    let mut first = scenario.build_world().expect("world");
    let mut engine = EngineBuilder::new(EngineSettings::new("persist"))
        .with_standard_passes()
        .build();
    engine.run(&mut first, 80).expect("first leg");

    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("saves").join("valley.json");
    save_world(&first, &path).expect("save");
    let mut reloaded = load_world(&path, &scenario).expect("load");

    assert_eq!(reloaded.current_date(), first.current_date());
    assert_eq!(reloaded.tick(), first.tick());
    assert_eq!(fingerprint(&reloaded), fingerprint(&first));

    engine.run(&mut first, 80).expect("second leg");
    let mut other = EngineBuilder::new(EngineSettings::new("persist"))
        .with_standard_passes()
        .build();
    other.run(&mut reloaded, 80).expect("reloaded leg");

    assert_eq!(fingerprint(&reloaded), fingerprint(&first));
}

#[test]
fn loading_a_missing_save_fails_with_context() {
    let scenario = ScenarioLoader::new(".")
        .load("scenarios/archipelago.yaml")
        .expect("scenario should load");
    let temp = tempdir().expect("tempdir");
    let err = load_world(temp.path().join("nope.json"), &scenario).expect_err("missing save");
    assert!(err.to_string().contains("Failed to read save"));
}
