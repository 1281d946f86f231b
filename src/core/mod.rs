//! Core loader module
//!
//! Contains the loader configuration and the shared error types

mod config;
mod error;

pub use config::LoaderConfig;
pub use error::{ConfigError, KeyError, LoadError};
