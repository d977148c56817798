//! Application state shared across routes and background tasks

use std::sync::Arc;

use crate::config::Config;
use crate::game::{WorldState, WorldStore};
use crate::util::time::unix_millis;
use crate::ws::broadcast::Broadcaster;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub world: WorldStore,
    pub broadcaster: Broadcaster,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let world = WorldStore::new(WorldState::new(&config.game, unix_millis()));

        Self {
            config: Arc::new(config),
            world,
            broadcaster: Broadcaster::new(),
        }
    }
}

#[cfg(test)]
impl AppState {
    pub fn for_tests() -> Self {
        Self::new(Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "debug".to_string(),
            realtime_base_url: "http://127.0.0.1:9".to_string(),
            client_origin: None,
            game: crate::config::GameConfig::default(),
        })
    }
}
