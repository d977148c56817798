//! Game simulation modules

pub mod bot;
pub mod engine;
pub mod physics;
pub mod sim;
pub mod snapshot;
pub mod world;

pub use engine::GameLoop;
pub use snapshot::WorldSnapshot;
pub use world::{WorldState, WorldStore};
