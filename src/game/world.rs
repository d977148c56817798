//! World state and the locked store that owns it

use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::GameConfig;

use super::snapshot::WorldSnapshot;

/// Which way a player sprite faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

/// One avatar, keyed by the device id that drives it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub score: u64,
    /// Horizontal control input in [-1, 1]
    pub target_x: f32,
    pub direction: Direction,
    pub is_bot: bool,
    pub last_seen_ms: u64,
    /// Bot AI does nothing before this instant
    pub next_bot_update_ms: u64,
}

impl Player {
    pub fn new(id: String, name: String, lane_y: f32) -> Self {
        Self {
            id,
            name,
            x: 0.0,
            y: lane_y,
            score: 0,
            target_x: 0.0,
            direction: Direction::Right,
            is_bot: false,
            last_seen_ms: 0,
            next_bot_update_ms: 0,
        }
    }
}

/// A falling pinecone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pinecone {
    pub id: u64,
    pub x: f32,
    pub y: f32,
}

/// Canonical world state. Only reachable through [`WorldStore`] at runtime.
///
/// Both maps are ordered by id, so per-tick iteration order (and with it
/// "first player in range catches the pinecone") is by ascending id.
pub struct WorldState {
    pub tick: u64,
    pub world_wrap: bool,
    pub players: BTreeMap<String, Player>,
    pub pinecones: BTreeMap<u64, Pinecone>,
    next_pinecone_id: u64,
    pub next_spawn_at_ms: u64,
    /// Last time a `devices` event arrived; `None` until the link first delivers
    pub last_telemetry_ms: Option<u64>,
    /// Set while the world is held empty after losing the link
    pub source_lost: bool,
    pub rng: ChaCha8Rng,
}

impl WorldState {
    pub fn new(config: &GameConfig, now_ms: u64) -> Self {
        Self::with_rng(config, now_ms, ChaCha8Rng::from_entropy())
    }

    #[cfg(test)]
    pub fn with_seed(config: &GameConfig, now_ms: u64, seed: u64) -> Self {
        Self::with_rng(config, now_ms, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(config: &GameConfig, now_ms: u64, rng: ChaCha8Rng) -> Self {
        Self {
            tick: 0,
            world_wrap: config.world_wrap,
            players: BTreeMap::new(),
            pinecones: BTreeMap::new(),
            next_pinecone_id: 1,
            next_spawn_at_ms: now_ms + config.spawn_interval_ms,
            last_telemetry_ms: None,
            source_lost: false,
            rng,
        }
    }

    /// Insert a pinecone under a fresh id. Ids are never reused.
    pub fn add_pinecone(&mut self, x: f32, y: f32) -> u64 {
        let id = self.next_pinecone_id;
        self.next_pinecone_id += 1;
        self.pinecones.insert(id, Pinecone { id, x, y });
        id
    }

    /// Deep copy of everything a viewer sees
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.tick,
            world_wrap: self.world_wrap,
            players: self.players.clone(),
            pinecones: self.pinecones.clone(),
        }
    }
}

/// Shared handle to the single world. Every access goes through one lock;
/// callers must not await or do I/O inside the closures they pass in.
#[derive(Clone)]
pub struct WorldStore {
    inner: Arc<Mutex<WorldState>>,
}

impl WorldStore {
    pub fn new(state: WorldState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Run `f` with exclusive access to the world
    pub fn with<R>(&self, f: impl FnOnce(&mut WorldState) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        self.inner.lock().snapshot()
    }

    /// Zero one player's score. Returns the post-reset snapshot, or `None`
    /// when no such player exists.
    pub fn reset_score(&self, player_id: &str) -> Option<WorldSnapshot> {
        let mut state = self.inner.lock();
        let player = state.players.get_mut(player_id)?;
        player.score = 0;
        Some(state.snapshot())
    }

    pub fn player_count(&self) -> usize {
        self.inner.lock().players.len()
    }

    pub fn tick(&self) -> u64 {
        self.inner.lock().tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_player(id: &str, score: u64) -> WorldStore {
        let config = GameConfig::default();
        let mut state = WorldState::with_seed(&config, 0, 7);
        let mut player = Player::new(id.to_string(), id.to_string(), config.player_y);
        player.score = score;
        state.players.insert(id.to_string(), player);
        WorldStore::new(state)
    }

    #[test]
    fn pinecone_ids_are_never_reused() {
        let config = GameConfig::default();
        let mut state = WorldState::with_seed(&config, 0, 1);
        let a = state.add_pinecone(0.0, 9.0);
        state.pinecones.remove(&a);
        let b = state.add_pinecone(0.0, 9.0);
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn snapshot_is_independent_of_later_mutation() {
        let store = store_with_player("d1", 3);
        let snap = store.snapshot();
        store.with(|state| {
            state.players.get_mut("d1").unwrap().score = 10;
            state.add_pinecone(1.0, 2.0);
        });
        assert_eq!(snap.players["d1"].score, 3);
        assert!(snap.pinecones.is_empty());
    }

    #[test]
    fn reset_score_zeroes_existing_player() {
        let store = store_with_player("d1", 5);
        let snap = store.reset_score("d1").expect("player exists");
        assert_eq!(snap.players["d1"].score, 0);

        let again = store.reset_score("d1").expect("player still exists");
        assert_eq!(again.players["d1"].score, 0);
    }

    #[test]
    fn reset_score_ignores_unknown_player() {
        let store = store_with_player("d1", 5);
        assert!(store.reset_score("ghost").is_none());
        assert_eq!(store.snapshot().players["d1"].score, 5);
    }

    #[test]
    fn snapshot_serializes_wire_field_names() {
        let store = store_with_player("d1", 2);
        store.with(|state| {
            state.add_pinecone(0.5, 9.0);
        });
        let json = serde_json::to_value(store.snapshot()).unwrap();
        assert_eq!(json["worldWrap"], true);
        assert_eq!(json["players"]["d1"]["targetX"], 0.0);
        assert_eq!(json["players"]["d1"]["isBot"], false);
        assert_eq!(json["players"]["d1"]["direction"], "right");
        assert_eq!(json["pinecones"]["1"]["id"], 1);
    }
}
