//! Horizontal movement on a bounded or toroidal world

use crate::config::GameConfig;

/// Clamp a control input into [-1, 1]. Non-finite input counts as neutral.
pub fn clamp_target_x(value: f32) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(-1.0, 1.0)
}

/// Map `x` into `[-width/2, width/2)` treating the side edges as joined
pub fn wrap_x(x: f32, world_width: f32) -> f32 {
    let limit = world_width / 2.0;
    (x + limit).rem_euclid(world_width) - limit
}

/// Clamp `x` into `[-width/2, width/2]`
pub fn clamp_x(x: f32, world_width: f32) -> f32 {
    let limit = world_width / 2.0;
    x.clamp(-limit, limit)
}

/// Signed shortest horizontal offset from `from_x` to `to_x` going either way around
pub fn shortest_dx(from_x: f32, to_x: f32, world_width: f32) -> f32 {
    let mut dx = to_x - from_x;
    if dx > world_width / 2.0 {
        dx -= world_width;
    } else if dx < -world_width / 2.0 {
        dx += world_width;
    }
    dx
}

/// Horizontal offset honouring the configured topology
pub fn distance_x(from_x: f32, to_x: f32, config: &GameConfig) -> f32 {
    if config.world_wrap {
        shortest_dx(from_x, to_x, config.world_width)
    } else {
        to_x - from_x
    }
}

/// Position after moving `delta` from `current_x`
pub fn next_player_x(current_x: f32, delta: f32, config: &GameConfig) -> f32 {
    let next = current_x + delta;
    if config.world_wrap {
        wrap_x(next, config.world_width)
    } else {
        clamp_x(next, config.world_width)
    }
}
