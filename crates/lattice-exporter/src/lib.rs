//! lattice-exporter — push/pull bridge between worker processes and the
//! scrape endpoint.
//!
//! Workers snapshot their local registries on a fixed interval and push
//! the copies here; scrapers pull the merged result as Prometheus text.
//!
//! # Architecture
//!
//! ```text
//! Reporter (one per process)
//!   └── run() → registry.collect() → bridge.report() every interval
//!
//! ExporterBridge
//!   ├── report() ← latest snapshot per source
//!   └── merged() → value-level cross-process merge
//!
//! server
//!   └── GET /metrics → render(merged) per scrape
//! ```

pub mod bridge;
pub mod reporter;
pub mod server;

pub use bridge::ExporterBridge;
pub use reporter::{Reporter, DEFAULT_REPORT_INTERVAL};
pub use server::{router, serve};
