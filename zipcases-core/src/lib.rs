//! Core types and service wiring for the zipcases case count collector.

/// Domain models and identifiers shared by all providers.
pub mod model;
/// Registry and helpers for plugging region-specific providers into the service.
pub mod plugin;
/// Traits describing the provider interfaces.
pub mod ports;
/// Batch service that updates every registered region.
pub mod service;
/// Reading and atomically rewriting per-region table files.
pub mod store;
/// Zip code by date table and the daily merge.
pub mod table;

pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use service::*;
pub use store::*;
pub use table::*;
