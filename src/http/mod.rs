//! HTTP surface: health probe and viewer socket upgrade

pub mod routes;

pub use routes::build_router;
