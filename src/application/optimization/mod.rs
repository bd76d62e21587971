// Strategy parameter optimization
pub mod aggregator;
pub mod cache;
pub mod cancellation;
pub mod convergence;
pub mod engine;
pub mod evaluator;
pub mod reporting;
pub mod strategies;

pub use aggregator::ResultAggregator;
pub use cache::ResultCache;
pub use cancellation::CancellationToken;
pub use convergence::{ConvergenceMode, ConvergenceTracker, StopReason};
pub use engine::{OptimizationRequest, OptimizeEngine};
pub use evaluator::CachedEvaluator;
pub use reporting::OptimizeReporter;
pub use strategies::{SearchContext, SearchStrategy, build_strategy};
