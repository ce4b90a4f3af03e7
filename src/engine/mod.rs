pub mod assignment;
pub mod evaluator;
pub mod scoring;
pub mod stats;
