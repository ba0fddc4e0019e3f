//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! routing / filters / config / http:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or configured level)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the HTTP trace span
//! - Metrics are cheap counter increments, labelled by outcome

pub mod logging;
pub mod metrics;
