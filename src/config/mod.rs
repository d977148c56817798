//! Configuration module - environment variable parsing and fixed game tuning

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Base URL of the dashboard exposing `/api/realtime/stream`
    pub realtime_base_url: String,
    /// Allowed viewer origins for CORS, `None` means any origin
    pub client_origin: Option<String>,

    /// Simulation constants
    pub game: GameConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8082".to_string())
        };

        let realtime_base_url = normalize_base_url(
            &env::var("REALTIME_BASE_URL").unwrap_or_else(|_| "http://localhost:80".to_string()),
        )?;

        let client_origin = env::var("CLIENT_ORIGIN")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && s != "*");

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            realtime_base_url,
            client_origin,
            game: GameConfig::default(),
        })
    }

    /// Full URL of the upstream live-devices stream
    pub fn stream_url(&self) -> String {
        format!(
            "{}/api/realtime/stream?ids=&interval=10",
            self.realtime_base_url
        )
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidUpstream(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Fixed simulation tuning. Not adjustable at runtime.
#[derive(Clone, Debug)]
pub struct GameConfig {
    pub tick_rate_hz: u32,
    pub spawn_interval_ms: u64,
    pub world_width: f32,
    /// Lane height every player is snapped to
    pub player_y: f32,
    pub player_speed: f32,
    pub pinecone_speed: f32,
    pub catch_distance: f32,
    pub pinecone_start_y: f32,
    /// Pinecones below this y have left the world
    pub pinecone_end_y: f32,
    /// Distance from the side edges kept free when spawning
    pub spawn_margin: f32,
    /// Silence on the telemetry link before the world is cleared
    pub link_stale_ms: u64,
    /// Silence from one device before its player is dropped
    pub player_stale_ms: u64,
    pub world_wrap: bool,
    pub max_name_len: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        // Heights are laid out around a 14-unit tall field
        let world_height = 14.0;
        Self {
            tick_rate_hz: 30,
            spawn_interval_ms: 1000,
            world_width: 20.0,
            player_y: -world_height / 2.0 + 2.5,
            player_speed: 12.5,
            pinecone_speed: 9.375,
            catch_distance: 1.3,
            pinecone_start_y: world_height / 2.0 + 2.0,
            pinecone_end_y: -world_height / 2.0 - 2.0,
            spawn_margin: 1.0,
            link_stale_ms: 3000,
            player_stale_ms: 3000,
            world_wrap: true,
            max_name_len: 24,
        }
    }
}

impl GameConfig {
    /// Nominal time between ticks
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate_hz.max(1) as u64)
    }

    /// Nominal tick length in seconds
    pub fn tick_secs(&self) -> f32 {
        1.0 / self.tick_rate_hz.max(1) as f32
    }

    pub fn half_width(&self) -> f32 {
        self.world_width / 2.0
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid REALTIME_BASE_URL: {0}")]
    InvalidUpstream(String),
}
