use anyhow::Result;

use crate::{
    engine::{System, SystemContext},
    world::World,
};

/// Moves the date forward to the earlier of the skip target and the next
/// queued event.
pub struct ClockSystem;

impl ClockSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClockSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ClockSystem {
    fn name(&self) -> &str {
        "clock"
    }

    fn run(&mut self, _ctx: &SystemContext, world: &mut World) -> Result<()> {
        let mut target = world.pending.date_to_skip_to;
        if let Some(next) = world.events.peek_date() {
            target = target.min(next);
        }
        let span = target - world.current_date;
        world.pending.span = span;
        world.current_date = target;
        world.tick += 1;
        Ok(())
    }
}
