use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    report::TickReport,
    snapshot::SnapshotWriter,
    systems::{
        ClockSystem, DeferredActionsSystem, DrainEventsSystem, MigrationSystem, PostUpdateSystem,
        RemoveGroupsSystem, RemovePolitiesSystem, ScheduleSystem, UpdateGroupsSystem,
        UpdatePolitiesSystem,
    },
    world::World,
};

pub struct EngineSettings {
    pub scenario_name: String,
    pub snapshot_interval_ticks: u64,
    pub snapshot_dir: PathBuf,
    /// Log a summary line every N ticks; 0 disables.
    pub report_interval_ticks: u64,
}

impl EngineSettings {
    pub fn new(scenario_name: impl Into<String>) -> Self {
        Self {
            scenario_name: scenario_name.into(),
            snapshot_interval_ticks: 0,
            snapshot_dir: PathBuf::from("snapshots"),
            report_interval_ticks: 0,
        }
    }
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn push_system(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    /// Installs the tick passes in their required order.
    pub fn with_standard_passes(self) -> Self {
        self.with_system(DrainEventsSystem::new())
            .with_system(UpdateGroupsSystem::new())
            .with_system(MigrationSystem::new())
            .with_system(DeferredActionsSystem::new())
            .with_system(PostUpdateSystem::new())
            .with_system(RemoveGroupsSystem::new())
            .with_system(ScheduleSystem::new())
            .with_system(UpdatePolitiesSystem::new())
            .with_system(RemovePolitiesSystem::new())
            .with_system(ClockSystem::new())
    }

    pub fn build(self) -> Engine {
        Engine {
            systems: self.systems,
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_ticks,
            ),
            settings: self.settings,
        }
    }
}

pub struct Engine {
    systems: Vec<Box<dyn System>>,
    snapshot_writer: SnapshotWriter,
    settings: EngineSettings,
}

impl Engine {
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Runs one tick. A world without groups is left untouched and reports a
    /// zero span.
    pub fn tick(&mut self, world: &mut World) -> Result<TickReport> {
        if world.group_count() == 0 {
            return Ok(world.take_report());
        }

        let ctx = SystemContext {
            tick: world.tick(),
            date: world.current_date(),
            scenario_name: &self.settings.scenario_name,
        };
        for system in &mut self.systems {
            system
                .run(&ctx, world)
                .with_context(|| format!("{} pass failed at tick {}", system.name(), ctx.tick))?;
        }

        let report = world.take_report();
        self.snapshot_writer
            .maybe_write(world, &self.settings.scenario_name)?;

        let interval = self.settings.report_interval_ticks;
        if interval > 0 && report.tick % interval == 0 {
            info!(
                tick = report.tick,
                date = report.date,
                groups = report.group_count,
                polities = report.polity_count,
                population = report.total_population,
                "simulation progress"
            );
        }
        Ok(report)
    }

    pub fn run(&mut self, world: &mut World, ticks: u64) -> Result<()> {
        self.run_with_hook(world, ticks, |_| {})
    }

    pub fn run_with_hook<F>(&mut self, world: &mut World, ticks: u64, mut hook: F) -> Result<()>
    where
        F: FnMut(&TickReport),
    {
        for _ in 0..ticks {
            let report = self.tick(world)?;
            hook(&report);
            if world.group_count() == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Ticks until `budget` of wall-clock time is spent. At least one tick
    /// runs; an empty world stops early.
    pub fn run_frame(&mut self, world: &mut World, budget: Duration) -> Result<Vec<TickReport>> {
        let started = Instant::now();
        let mut reports = Vec::new();
        loop {
            let report = self.tick(world)?;
            let idle = report.span == 0 && world.group_count() == 0;
            reports.push(report);
            if idle || started.elapsed() >= budget {
                break;
            }
        }
        Ok(reports)
    }
}

pub struct SystemContext<'a> {
    pub tick: u64,
    pub date: i64,
    pub scenario_name: &'a str,
}

/// One pass of the tick. Passes run in insertion order.
pub trait System: Send {
    fn name(&self) -> &str;
    fn run(&mut self, ctx: &SystemContext, world: &mut World) -> Result<()>;
}
