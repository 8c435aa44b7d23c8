use holocene::{
    engine::{EngineBuilder, EngineSettings},
    scenario::ScenarioLoader,
};
use tempfile::tempdir;

#[test]
fn engine_runs_hook_each_tick() {
    let loader = ScenarioLoader::new(".");
    let scenario = loader
        .load("scenarios/river_valley.yaml")
        .expect("scenario should load");
    let mut world = scenario.build_world().expect("world builds");
    let temp = tempdir().expect("tempdir");
    let settings = EngineSettings {
        scenario_name: scenario.name.clone(),
        snapshot_interval_ticks: 0,
        snapshot_dir: temp.path().to_path_buf(),
        report_interval_ticks: 0,
    };
    let mut engine = EngineBuilder::new(settings).with_standard_passes().build();

    let mut ticks = Vec::new();
    let mut dates = Vec::new();
    engine
        .run_with_hook(&mut world, 6, |report| {
            ticks.push(report.tick);
            dates.push(report.date);
        })
        .expect("run succeeds");

    assert_eq!(ticks.len(), 6);
    assert_eq!(ticks.first().copied(), Some(1));
    assert_eq!(ticks.last().copied(), Some(6));
    assert!(dates.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn snapshots_are_written_on_the_interval() {
    let scenario = ScenarioLoader::new(".")
        .load("scenarios/river_valley.yaml")
        .expect("scenario should load");
    let mut world = scenario.build_world().expect("world builds");
    let temp = tempdir().expect("tempdir");
    let settings = EngineSettings {
        scenario_name: scenario.name.clone(),
        snapshot_interval_ticks: 5,
        snapshot_dir: temp.path().to_path_buf(),
        report_interval_ticks: 0,
    };
    let mut engine = EngineBuilder::new(settings).with_standard_passes().build();
    engine.run(&mut world, 10).expect("run succeeds");

    let dir = temp.path().join("river_valley");
    assert!(dir.join("tick_000005.json").exists());
    assert!(dir.join("tick_000010.json").exists());
    assert!(!dir.join("tick_000003.json").exists());
}
