mod clock;
mod events;
mod groups;
mod migration;
mod polities;

pub use clock::ClockSystem;
pub use events::DrainEventsSystem;
pub use groups::{PostUpdateSystem, RemoveGroupsSystem, ScheduleSystem, UpdateGroupsSystem};
pub use migration::{DeferredActionsSystem, MigrationSystem};
pub use polities::{RemovePolitiesSystem, UpdatePolitiesSystem};
