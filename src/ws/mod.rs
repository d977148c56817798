//! Viewer WebSocket channel

pub mod broadcast;
pub mod handler;
pub mod protocol;
