// Synthetic evaluators for tests and demos
pub mod mock;

// Metrics and tracing setup
pub mod observability;
