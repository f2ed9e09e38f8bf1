//! Common types, errors and collaborator contracts

pub mod errors;
pub mod indicators;
pub mod metrics;
pub mod traits;
pub mod types;
