//! Applying `devices` payloads from the realtime stream to the world
//!
//! Payload shape:
//! `{"server_time": .., "devices": {<id>: {"description": .., "pins": {<pin>: {"name": .., "value": ..}}, "is_simulator": ..}}}`

use serde_json::{Map, Value};

use crate::config::GameConfig;
use crate::game::physics::clamp_target_x;
use crate::game::world::{Player, WorldState};

/// Pin name carrying the horizontal control axis
pub const X_AXIS_PIN: &str = "X Axis";

/// Strings accepted as a true simulator flag (compared trimmed, lowercase)
const TRUTHY_STRINGS: [&str; 4] = ["1", "true", "yes", "on"];

/// Upsert every device in `payload` as a player and mark the link alive.
/// Returns the number of devices applied.
pub fn apply_devices(
    state: &mut WorldState,
    config: &GameConfig,
    payload: &Map<String, Value>,
    now_ms: u64,
) -> usize {
    let mut applied = 0;

    if let Some(devices) = payload.get("devices").and_then(Value::as_object) {
        for (device_id, device) in devices {
            let Some(device) = device.as_object() else {
                continue;
            };
            upsert_player(state, config, device_id, device, now_ms);
            applied += 1;
        }
    }

    state.last_telemetry_ms = Some(now_ms);
    applied
}

fn upsert_player(
    state: &mut WorldState,
    config: &GameConfig,
    device_id: &str,
    device: &Map<String, Value>,
    now_ms: u64,
) {
    let target_x = extract_target_x(device);
    let name = display_name(device_id, device.get("description"), config.max_name_len);
    let is_bot = device.get("is_simulator").is_some_and(is_truthy);

    let player = state
        .players
        .entry(device_id.to_string())
        .or_insert_with(|| Player::new(device_id.to_string(), name.clone(), config.player_y));

    player.name = name;
    player.is_bot = is_bot;
    player.last_seen_ms = now_ms;
    if !is_bot {
        player.target_x = target_x;
    }
}

/// Control axis from the pin named [`X_AXIS_PIN`], clamped to [-1, 1]; 0.0 if missing
pub fn extract_target_x(device: &Map<String, Value>) -> f32 {
    let Some(pins) = device.get("pins").and_then(Value::as_object) else {
        return 0.0;
    };

    pins.values()
        .filter_map(Value::as_object)
        .find(|pin| pin.get("name").and_then(Value::as_str) == Some(X_AXIS_PIN))
        .map(|pin| pin.get("value").map_or(0.0, axis_value))
        .unwrap_or(0.0)
}

fn axis_value(value: &Value) -> f32 {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    raw.map_or(0.0, |v| clamp_target_x(v as f32))
}

/// Simulator flag coercion: `true`, the number 1, or one of [`TRUTHY_STRINGS`]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            TRUTHY_STRINGS.contains(&s.as_str())
        }
        _ => false,
    }
}

fn display_name(device_id: &str, description: Option<&Value>, max_len: usize) -> String {
    let described = match description {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
        Some(Value::Bool(true)) => "True".to_string(),
        _ => String::new(),
    };
    let name = if described.is_empty() {
        device_id.trim()
    } else {
        described.as_str()
    };
    let name = if name.is_empty() { device_id } else { name };
    name.chars().take(max_len).collect()
}
