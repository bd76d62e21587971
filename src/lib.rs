//! Strategy parameter optimization engine.
//!
//! Searches a trading strategy's parameter space with one of seven
//! interchangeable algorithms, scoring candidates through a pluggable
//! `FitnessEvaluator` backed by a (real or simulated) backtest engine.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
