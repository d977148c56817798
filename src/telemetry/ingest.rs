//! Long-lived reader for the dashboard's live-devices stream

use futures::StreamExt;
use reqwest::{header, Client};
use serde_json::Value;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::{Config, GameConfig};
use crate::game::WorldStore;
use crate::util::shutdown::ShutdownRx;
use crate::util::time::unix_millis;

use super::devices::apply_devices;
use super::sse::{LineBuffer, SseEvent, SseParser};

/// Name of the only stream event the game consumes
pub const DEVICES_EVENT: &str = "devices";

const RETRY_DELAY: Duration = Duration::from_secs(1);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// A stream silent for this long (not even keepalives) is treated as dropped
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Keeps the world's players in sync with upstream device telemetry
pub struct TelemetryIngestor {
    client: Client,
    stream_url: String,
    world: WorldStore,
    game: GameConfig,
}

impl TelemetryIngestor {
    pub fn new(config: &Config, world: WorldStore) -> Result<Self, IngestError> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        Ok(Self {
            client,
            stream_url: config.stream_url(),
            world,
            game: config.game.clone(),
        })
    }

    /// Stream forever, reconnecting after a fixed delay on any failure
    pub async fn run(self, mut shutdown: ShutdownRx) {
        info!(url = %self.stream_url, "Telemetry ingestor started");

        loop {
            tokio::select! {
                result = self.stream_once() => {
                    if let Err(e) = result {
                        warn!(error = %e, "Telemetry stream failed, retrying in {:?}", RETRY_DELAY);
                    }
                }
                _ = shutdown.wait() => break,
            }

            tokio::select! {
                _ = sleep(RETRY_DELAY) => {}
                _ = shutdown.wait() => break,
            }
        }

        info!("Telemetry ingestor stopped");
    }

    /// One connection's lifetime. Only ever ends with an error.
    async fn stream_once(&self) -> Result<(), IngestError> {
        let response = self
            .client
            .get(&self.stream_url)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IngestError::Status(response.status().as_u16()));
        }

        info!(url = %self.stream_url, "Connected to telemetry stream");

        let mut body = response.bytes_stream();
        let mut lines = LineBuffer::new();
        let mut parser = SseParser::new();

        loop {
            let chunk = match timeout(READ_TIMEOUT, body.next()).await {
                Err(_) => return Err(IngestError::ReadTimeout),
                Ok(None) => return Err(IngestError::StreamEnded),
                Ok(Some(chunk)) => chunk?,
            };

            lines.extend(&chunk);
            while let Some(line) = lines.next_line() {
                if let Some(event) = parser.feed_line(&line) {
                    apply_event(&self.world, &self.game, &event, unix_millis());
                }
            }
        }
    }
}

/// Apply one parsed stream event. Returns whether the world was touched.
/// Malformed payloads are dropped without affecting the link timestamp.
pub fn apply_event(world: &WorldStore, game: &GameConfig, event: &SseEvent, now_ms: u64) -> bool {
    if event.event != DEVICES_EVENT {
        debug!(event = %event.event, "Ignoring stream event");
        return false;
    }

    match serde_json::from_str::<Value>(&event.data) {
        Ok(Value::Object(payload)) => {
            let applied = world.with(|state| apply_devices(state, game, &payload, now_ms));
            debug!(devices = applied, "Applied devices event");
            true
        }
        Ok(_) => {
            debug!("Discarding non-object devices payload");
            false
        }
        Err(e) => {
            debug!(error = %e, "Discarding undecodable devices payload");
            false
        }
    }
}

/// Telemetry connection errors. All of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upstream returned status {0}")]
    Status(u16),

    #[error("No data received within the read timeout")]
    ReadTimeout,

    #[error("Upstream closed the stream")]
    StreamEnded,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::sim::advance;
    use crate::game::WorldState;
    use axum::{http::header::CONTENT_TYPE, routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    const D1_EVENT: &str = concat!(
        ": keepalive\n\n",
        "event: devices\n",
        "data: {\"server_time\": 1, \"devices\": {\"d1\": {\"pins\": {\"p0\": {\"name\":\"X Axis\",\"value\":1}}, \"is_simulator\": false}}}\n",
        "\n",
    );

    fn store(game: &GameConfig) -> WorldStore {
        WorldStore::new(WorldState::with_seed(game, 0, 3))
    }

    fn parse(text: &str) -> Vec<SseEvent> {
        let mut lines = LineBuffer::new();
        let mut parser = SseParser::new();
        lines.extend(text.as_bytes());
        std::iter::from_fn(|| lines.next_line())
            .filter_map(|line| parser.feed_line(&line))
            .collect()
    }

    #[test]
    fn telemetry_driven_player_moves_each_tick() {
        let game = GameConfig::default();
        let world = store(&game);
        let now = 500;

        for event in parse(D1_EVENT) {
            assert!(apply_event(&world, &game, &event, now));
        }

        let dt = game.tick_secs();
        let step = game.player_speed * dt;
        let mut last_x = world.snapshot().players["d1"].x;
        for _ in 0..5 {
            world.with(|state| advance(state, &game, dt, now));
            let x = world.snapshot().players["d1"].x;
            assert!((x - (last_x + step)).abs() < 1e-4, "{last_x} -> {x}");
            last_x = x;
        }
    }

    #[test]
    fn other_events_and_bad_payloads_are_dropped() {
        let game = GameConfig::default();
        let world = store(&game);

        let events = parse("event: status\ndata: {}\n\nevent: devices\ndata: [1,2]\n\nevent: devices\ndata: {oops\n\n");
        assert_eq!(events.len(), 3);
        for event in &events {
            assert!(!apply_event(&world, &game, event, 10));
        }
        world.with(|state| assert_eq!(state.last_telemetry_ms, None));
    }

    #[tokio::test]
    async fn stream_once_ingests_events_until_upstream_closes() {
        let app = Router::new().route(
            "/api/realtime/stream",
            get(|| async { ([(CONTENT_TYPE, "text/event-stream")], D1_EVENT) }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let game = GameConfig::default();
        let world = store(&game);
        let config = Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "debug".into(),
            realtime_base_url: format!("http://{addr}"),
            client_origin: None,
            game,
        };
        let ingestor = TelemetryIngestor::new(&config, world.clone()).unwrap();

        let result = ingestor.stream_once().await;

        assert!(matches!(result, Err(IngestError::StreamEnded)), "{result:?}");
        let snapshot = world.snapshot();
        assert_eq!(snapshot.players["d1"].target_x, 1.0);
        world.with(|state| assert!(state.last_telemetry_ms.is_some()));
    }

    #[tokio::test]
    async fn run_reconnects_after_upstream_closes_until_shutdown() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/api/realtime/stream",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ([(CONTENT_TYPE, "text/event-stream")], D1_EVENT)
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let game = GameConfig::default();
        let world = store(&game);
        let config = Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "debug".into(),
            realtime_base_url: format!("http://{addr}"),
            client_origin: None,
            game,
        };
        let ingestor = TelemetryIngestor::new(&config, world.clone()).unwrap();
        let (tx, rx) = crate::util::shutdown::shutdown_channel();
        let handle = tokio::spawn(ingestor.run(rx));

        // Each connection ends immediately, so a second hit means the retry ran
        let reconnected = tokio::time::timeout(Duration::from_millis(2_500), async {
            while hits.load(Ordering::SeqCst) < 2 {
                sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(reconnected.is_ok(), "hits: {}", hits.load(Ordering::SeqCst));
        assert!(world.snapshot().players.contains_key("d1"));

        // The stream is already closed again, so run is parked in the retry delay
        sleep(Duration::from_millis(100)).await;
        tx.trigger();
        let stopped = tokio::time::timeout(Duration::from_millis(500), handle).await;
        tokio_test::assert_ok!(tokio_test::assert_ok!(stopped));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new()).await.unwrap();
        });

        let game = GameConfig::default();
        let config = Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "debug".into(),
            realtime_base_url: format!("http://{addr}"),
            client_origin: None,
            game: game.clone(),
        };
        let ingestor = TelemetryIngestor::new(&config, store(&game)).unwrap();

        assert!(matches!(
            ingestor.stream_once().await,
            Err(IngestError::Status(404))
        ));
    }
}
