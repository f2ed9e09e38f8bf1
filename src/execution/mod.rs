//! Executor implementations

pub mod paper;

pub use paper::PaperExecutor;
