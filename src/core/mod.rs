//! Core foundational modules: configuration and error handling

pub mod config;
pub mod error;

pub use config::{Config, StorageConfig, StorageType};
pub use error::{Error, Result};
