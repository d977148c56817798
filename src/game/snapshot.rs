//! Serializable world snapshots

use serde::Serialize;
use std::collections::BTreeMap;

use super::world::{Pinecone, Player};

/// Full copy of the world at the end of a tick. Owns all of its data, so it
/// can be serialized and sent after the world lock is released.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub tick: u64,
    pub world_wrap: bool,
    pub players: BTreeMap<String, Player>,
    pub pinecones: BTreeMap<u64, Pinecone>,
}
