//! Shared domain types, configuration, and errors for Apprentice.

pub mod config;
pub mod error;
pub mod types;

pub use config::ApprenticeConfig;
pub use error::{ApprenticeError, Result};
pub use types::*;
