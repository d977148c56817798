//! Fixed-rate tick loop driving the shared world

use std::time::Instant;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::util::shutdown::ShutdownRx;
use crate::util::time::unix_millis;
use crate::ws::broadcast::Broadcaster;
use crate::ws::protocol::ServerMsg;

use super::sim::{advance, clamp_dt};
use super::world::WorldStore;

/// The simulation task. Owns nothing but handles: the world lives in the store.
pub struct GameLoop {
    world: WorldStore,
    config: GameConfig,
    broadcaster: Broadcaster,
}

impl GameLoop {
    pub fn new(world: WorldStore, config: GameConfig, broadcaster: Broadcaster) -> Self {
        Self {
            world,
            config,
            broadcaster,
        }
    }

    /// Run until shutdown is signalled
    pub async fn run(self, mut shutdown: ShutdownRx) {
        info!(tick_rate_hz = self.config.tick_rate_hz, "Game loop started");

        let tick_secs = self.config.tick_secs();
        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.wait() => break,
            }

            let now = Instant::now();
            let dt = clamp_dt(now.duration_since(last_tick).as_secs_f32(), tick_secs);
            last_tick = now;

            self.step(dt, unix_millis());
        }

        info!("Game loop stopped");
    }

    /// Advance one tick and publish the result. The lock is released before
    /// the snapshot is handed to the broadcaster.
    pub fn step(&self, dt: f32, now_ms: u64) {
        let (report, snapshot) = self.world.with(|state| {
            let report = advance(state, &self.config, dt, now_ms);
            (report, state.snapshot())
        });

        if report.source_lost {
            info!(tick = snapshot.tick, "Telemetry link stale, world cleared");
        }
        if !report.pruned.is_empty() {
            debug!(players = ?report.pruned, "Pruned silent players");
        }
        for (pinecone_id, player_id) in &report.catches {
            debug!(pinecone_id, player_id = %player_id, "Pinecone caught");
        }

        self.broadcaster.send(ServerMsg::StateUpdate(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::WorldState;

    #[tokio::test]
    async fn each_step_broadcasts_a_full_update() {
        let config = GameConfig::default();
        let world = WorldStore::new(WorldState::with_seed(&config, 0, 9));
        let broadcaster = Broadcaster::new();
        let mut rx = broadcaster.subscribe();
        let game = GameLoop::new(world.clone(), config.clone(), broadcaster);

        game.step(config.tick_secs(), 10);
        game.step(config.tick_secs(), 20);

        for expected_tick in 1..=2 {
            match rx.recv().await.unwrap() {
                ServerMsg::StateUpdate(snapshot) => assert_eq!(snapshot.tick, expected_tick),
                other => panic!("unexpected message {other:?}"),
            }
        }
        assert_eq!(world.tick(), 2);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let config = GameConfig::default();
        let world = WorldStore::new(WorldState::with_seed(&config, 0, 9));
        let game = GameLoop::new(world.clone(), config, Broadcaster::new());
        let (tx, rx) = crate::util::shutdown::shutdown_channel();

        let handle = tokio::spawn(game.run(rx));
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        tx.trigger();
        tokio_test::assert_ok!(handle.await);

        assert!(world.tick() >= 1);
    }
}
