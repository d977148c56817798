//! Viewer protocol message definitions
//! These are the wire types pushed to and received from dashboard viewers.
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::game::WorldSnapshot;

/// Messages sent from viewer to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Zero one player's score
    ResetScore(ResetScore),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetScore {
    #[serde(rename = "playerId", default)]
    pub player_id: String,
}

/// Messages sent from server to viewer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Full world, sent once to a viewer right after it connects
    StateSnapshot(WorldSnapshot),
    /// Full world, broadcast after every tick and every score reset
    StateUpdate(WorldSnapshot),
}
