// Strategy optimization: search strategies, evaluation and reporting
pub mod optimization;
