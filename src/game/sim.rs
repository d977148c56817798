//! One simulation step over the world state
//!
//! Phase order per tick is fixed: liveness check, spawn, staleness prune,
//! player update, pinecone update. Within a phase entities are visited in
//! ascending id order.

use rand::Rng;

use crate::config::GameConfig;
use crate::util::time::millis_since;

use super::bot;
use super::physics::{clamp_target_x, distance_x, next_player_x};
use super::world::{Direction, WorldState};

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The telemetry link went stale and the world was cleared this tick
    pub source_lost: bool,
    pub spawned: Option<u64>,
    pub pruned: Vec<String>,
    /// (pinecone id, player id) for every catch
    pub catches: Vec<(u64, String)>,
    pub fell_out: usize,
}

/// Clamp a measured tick length into `[interval, 1.5 * interval]`
pub fn clamp_dt(raw_secs: f32, interval_secs: f32) -> f32 {
    if raw_secs.is_nan() || raw_secs < interval_secs {
        interval_secs
    } else {
        raw_secs.min(interval_secs * 1.5)
    }
}

/// Advance the world by `dt` seconds at wall time `now_ms`
pub fn advance(state: &mut WorldState, config: &GameConfig, dt: f32, now_ms: u64) -> TickReport {
    let mut report = TickReport::default();

    if link_is_stale(state, config, now_ms) {
        state.players.clear();
        state.pinecones.clear();
        state.next_spawn_at_ms = now_ms + config.spawn_interval_ms;
        state.tick += 1;
        report.source_lost = !state.source_lost;
        state.source_lost = true;
        return report;
    }
    state.source_lost = false;

    report.spawned = spawn_pinecone(state, config, now_ms);
    report.pruned = prune_stale_players(state, config, now_ms);
    update_players(state, config, dt, now_ms);
    update_pinecones(state, config, dt, &mut report);

    state.tick += 1;
    report
}

fn link_is_stale(state: &WorldState, config: &GameConfig, now_ms: u64) -> bool {
    state
        .last_telemetry_ms
        .is_some_and(|last| millis_since(now_ms, last) > config.link_stale_ms)
}

fn spawn_pinecone(state: &mut WorldState, config: &GameConfig, now_ms: u64) -> Option<u64> {
    if state.players.is_empty() || now_ms < state.next_spawn_at_ms {
        return None;
    }

    let limit = (config.half_width() - config.spawn_margin).max(0.0);
    let x = state.rng.gen_range(-limit..=limit);
    let id = state.add_pinecone(x, config.pinecone_start_y);
    state.next_spawn_at_ms = now_ms + config.spawn_interval_ms;
    Some(id)
}

fn prune_stale_players(state: &mut WorldState, config: &GameConfig, now_ms: u64) -> Vec<String> {
    let stale: Vec<String> = state
        .players
        .values()
        .filter(|p| millis_since(now_ms, p.last_seen_ms) > config.player_stale_ms)
        .map(|p| p.id.clone())
        .collect();

    for id in &stale {
        state.players.remove(id);
    }
    stale
}

fn update_players(state: &mut WorldState, config: &GameConfig, dt: f32, now_ms: u64) {
    let WorldState {
        players,
        pinecones,
        rng,
        ..
    } = state;

    for player in players.values_mut() {
        if player.is_bot {
            bot::decide(player, pinecones, config, now_ms, rng);
        }

        let target_x = clamp_target_x(player.target_x);
        player.target_x = target_x;
        player.x = next_player_x(player.x, target_x * config.player_speed * dt, config);

        if target_x > 0.0 {
            player.direction = Direction::Right;
        } else if target_x < 0.0 {
            player.direction = Direction::Left;
        }

        player.y = config.player_y;
    }
}

fn update_pinecones(state: &mut WorldState, config: &GameConfig, dt: f32, report: &mut TickReport) {
    let WorldState {
        players, pinecones, ..
    } = state;
    let mut removed = Vec::new();

    for cone in pinecones.values_mut() {
        cone.y -= config.pinecone_speed * dt;

        if cone.y < config.pinecone_end_y {
            removed.push(cone.id);
            report.fell_out += 1;
            continue;
        }

        let catcher = players.values_mut().find(|player| {
            let dx = distance_x(player.x, cone.x, config);
            let dy = player.y - cone.y;
            (dx * dx + dy * dy).sqrt() <= config.catch_distance
        });

        if let Some(player) = catcher {
            player.score += 1;
            removed.push(cone.id);
            report.catches.push((cone.id, player.id.clone()));
        }
    }

    for id in removed {
        pinecones.remove(&id);
    }
}
