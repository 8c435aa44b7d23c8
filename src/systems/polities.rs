use anyhow::Result;

use crate::{
    engine::{System, SystemContext},
    world::World,
};

pub struct UpdatePolitiesSystem;

impl UpdatePolitiesSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UpdatePolitiesSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for UpdatePolitiesSystem {
    fn name(&self) -> &str {
        "update_polities"
    }

    fn run(&mut self, _ctx: &SystemContext, world: &mut World) -> Result<()> {
        for id in std::mem::take(&mut world.pending.polities_to_update) {
            world.update_polity(id)?;
        }
        Ok(())
    }
}

pub struct RemovePolitiesSystem;

impl RemovePolitiesSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RemovePolitiesSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for RemovePolitiesSystem {
    fn name(&self) -> &str {
        "remove_polities"
    }

    fn run(&mut self, _ctx: &SystemContext, world: &mut World) -> Result<()> {
        for id in std::mem::take(&mut world.pending.polities_to_remove) {
            world.remove_polity(id)?;
        }
        Ok(())
    }
}
