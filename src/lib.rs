pub mod config;
pub mod culture;
pub mod engine;
pub mod error;
pub mod events;
pub mod group;
pub mod influence;
pub mod migration;
pub mod persistence;
pub mod polity;
pub mod report;
pub mod rng;
pub mod scenario;
pub mod snapshot;
pub mod systems;
pub mod terrain;
pub mod web;
pub mod world;

pub use engine::{Engine, EngineBuilder, EngineSettings};
pub use error::SimulationError;
pub use report::{Occurrence, TickReport};
pub use scenario::{Scenario, ScenarioLoader};
pub use world::World;
