//! Observability infrastructure
//!
//! Structured logging via `tracing`; counters and histograms are emitted
//! through the `metrics` facade and picked up by whatever recorder the host
//! application installs.

mod tracing_setup;

pub use tracing_setup::init_tracing;
