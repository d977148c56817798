//! Ingestion of live device telemetry from the dashboard

pub mod devices;
pub mod ingest;
pub mod sse;

pub use ingest::TelemetryIngestor;
