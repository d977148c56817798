//! Steering policy for simulator-backed players
//!
//! Bots are meant to look alive, not to play well: they sometimes chase the
//! nearest falling pinecone and otherwise wander.

use rand::Rng;
use std::collections::BTreeMap;

use crate::config::GameConfig;

use super::physics::{clamp_target_x, distance_x};
use super::world::{Pinecone, Player};

/// Chance that a decision looks for a pinecone at all
const CHASE_PROBABILITY: f64 = 0.65;
/// Horizontal gap under which steering becomes proportional
const DEAD_ZONE: f32 = 0.5;
/// Delay before re-evaluating while chasing
const CHASE_REACTION_MS: u64 = 400;
/// Dwell range for a random wander decision
const WANDER_DWELL_MS: std::ops::Range<u64> = 500..1500;

/// Possibly pick a new `target_x` for `player`. Only acts once `now_ms` has
/// reached the player's own decision deadline.
pub fn decide<R: Rng>(
    player: &mut Player,
    pinecones: &BTreeMap<u64, Pinecone>,
    config: &GameConfig,
    now_ms: u64,
    rng: &mut R,
) {
    if !player.is_bot || now_ms < player.next_bot_update_ms {
        return;
    }

    if rng.gen_bool(CHASE_PROBABILITY) {
        if let Some(dx) = nearest_pinecone_dx(player.x, pinecones, config) {
            player.target_x = if dx.abs() > DEAD_ZONE {
                dx.signum()
            } else {
                clamp_target_x(dx)
            };
            player.next_bot_update_ms = now_ms + CHASE_REACTION_MS;
            return;
        }
    }

    player.target_x = rng.gen_range(-1.0..=1.0);
    player.next_bot_update_ms = now_ms + rng.gen_range(WANDER_DWELL_MS);
}

/// Horizontal offset to the closest pinecone still above the player lane
fn nearest_pinecone_dx(
    player_x: f32,
    pinecones: &BTreeMap<u64, Pinecone>,
    config: &GameConfig,
) -> Option<f32> {
    let lane_y = config.player_y;
    pinecones
        .values()
        .filter(|cone| cone.y > lane_y)
        .map(|cone| {
            let dx = distance_x(player_x, cone.x, config);
            let dy = cone.y - lane_y;
            (dx, dx * dx + dy * dy)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(dx, _)| dx)
}
