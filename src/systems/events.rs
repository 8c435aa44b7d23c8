use anyhow::Result;
use tracing::trace;

use crate::{
    engine::{System, SystemContext},
    world::World,
};

/// Fires every event due at or before the current date and picks the date
/// the clock will skip to.
pub struct DrainEventsSystem;

impl DrainEventsSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DrainEventsSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for DrainEventsSystem {
    fn name(&self) -> &str {
        "drain_events"
    }

    fn run(&mut self, _ctx: &SystemContext, world: &mut World) -> Result<()> {
        world.pending.date_to_skip_to = world.date_after(1)?;
        while let Some(date) = world.events.peek_date() {
            if date > world.current_date {
                let horizon = world.date_after(world.config.max_years_to_skip)?;
                world.pending.date_to_skip_to = date.min(horizon);
                break;
            }
            let Some(event) = world.events.pop() else {
                break;
            };
            trace!(event = event.kind.name(), group = event.group.raw(), date, "firing");
            world.fire_event(event)?;
        }
        Ok(())
    }
}
