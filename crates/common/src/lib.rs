//! Common types and utilities shared across all crates

pub mod config;
pub mod error;
pub mod text;
pub mod tracing_setup;
pub mod types;

pub use config::*;
pub use error::*;
pub use tracing_setup::*;
pub use types::*;
