//! Landsat STAC ingester service.
//!
//! Wires the ingestion pipeline to its configuration and exposes the HTTP
//! trigger surface. The `landsat-stac` binary drives it from the command line.

pub mod app;
pub mod config;
pub mod server;

pub use config::IngesterConfig;
