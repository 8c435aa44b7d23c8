use anyhow::Result;

use crate::{
    engine::{System, SystemContext},
    world::World,
};

/// Splits every migrating group off its source, then lands them all. No
/// arrival is visible to a split of the same tick.
pub struct MigrationSystem;

impl MigrationSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MigrationSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for MigrationSystem {
    fn name(&self) -> &str {
        "migration"
    }

    fn run(&mut self, _ctx: &SystemContext, world: &mut World) -> Result<()> {
        let mut departed = Vec::new();
        for mut migrating in std::mem::take(&mut world.pending.migrating_groups) {
            if world.split_migrating_group(&mut migrating)? {
                departed.push(migrating);
            }
        }
        for migrating in &departed {
            world.move_migrating_group(migrating)?;
        }
        Ok(())
    }
}

/// Applies cross-group effects queued during the update pass.
pub struct DeferredActionsSystem;

impl DeferredActionsSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DeferredActionsSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for DeferredActionsSystem {
    fn name(&self) -> &str {
        "deferred_actions"
    }

    fn run(&mut self, _ctx: &SystemContext, world: &mut World) -> Result<()> {
        for action in std::mem::take(&mut world.pending.actions) {
            world.apply_group_action(&action);
        }
        Ok(())
    }
}
