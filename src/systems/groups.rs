use anyhow::Result;

use crate::{
    engine::{System, SystemContext},
    world::World,
};

/// Advances every group dirtied by this tick's events.
pub struct UpdateGroupsSystem;

impl UpdateGroupsSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UpdateGroupsSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for UpdateGroupsSystem {
    fn name(&self) -> &str {
        "update_groups"
    }

    fn run(&mut self, _ctx: &SystemContext, world: &mut World) -> Result<()> {
        for id in std::mem::take(&mut world.pending.groups_to_update) {
            world.update_group(id)?;
        }
        Ok(())
    }
}

/// Commits staged state of updated groups: discoveries, influence ledgers,
/// territory and extinction checks.
pub struct PostUpdateSystem;

impl PostUpdateSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PostUpdateSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for PostUpdateSystem {
    fn name(&self) -> &str {
        "post_update"
    }

    fn run(&mut self, _ctx: &SystemContext, world: &mut World) -> Result<()> {
        let updated: Vec<_> = world.pending.updated_groups.iter().copied().collect();
        for id in updated {
            world.post_update_group(id)?;
        }
        Ok(())
    }
}

pub struct RemoveGroupsSystem;

impl RemoveGroupsSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RemoveGroupsSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for RemoveGroupsSystem {
    fn name(&self) -> &str {
        "remove_groups"
    }

    fn run(&mut self, _ctx: &SystemContext, world: &mut World) -> Result<()> {
        for id in std::mem::take(&mut world.pending.groups_to_remove) {
            world.destroy_group(id)?;
        }
        Ok(())
    }
}

/// Schedules the next update, migration, expansion and discovery events of
/// every group touched this tick.
pub struct ScheduleSystem;

impl ScheduleSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ScheduleSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ScheduleSystem {
    fn name(&self) -> &str {
        "schedule"
    }

    fn run(&mut self, _ctx: &SystemContext, world: &mut World) -> Result<()> {
        for id in std::mem::take(&mut world.pending.updated_groups) {
            world.setup_group_for_next_update(id)?;
        }
        Ok(())
    }
}
