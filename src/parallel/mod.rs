//! Parallel batch compilation of independent code entries

pub mod executor;

pub use executor::{compile_batch, BatchConfig, BatchReport};
