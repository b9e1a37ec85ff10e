//! lattice-ingress — HTTP ingress integration for Lattice metrics.
//!
//! The ingress is where a request enters the platform: this crate's
//! middleware opens the request's observation context (route from the
//! matched path, the rest inherited from the upstream hop's
//! `x-lattice-context` header) and records the HTTP metric catalog for
//! every dispatched request.

pub mod middleware;

pub use middleware::{track, IngressMetrics, CONTEXT_HEADER};
