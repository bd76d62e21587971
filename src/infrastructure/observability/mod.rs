//! Observability for optimization runs
//!
//! Metrics are collected on a private Prometheus registry and rendered on
//! demand; nothing here opens a socket. Logs go through `tracing`.

pub mod logging;
pub mod metrics;

pub use logging::init_tracing;
pub use metrics::OptimizerMetrics;
