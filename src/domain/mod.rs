// Parameter search domain
pub mod optimization;

// Backtest metrics
pub mod performance;

// Port interfaces
pub mod ports;

// Domain-specific error types
pub mod errors;
