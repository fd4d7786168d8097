//! Common types, errors, and configuration for wasmbed.
//!
//! This crate provides shared functionality used across the wasmbed workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for engine and WASI settings
//! - Kind enumerations shared with the C boundary
//! - The per-thread last-error record
//! - Version components of this build

pub mod config;
pub mod config_file;
pub mod error;
pub mod kinds;
pub mod last_error;
pub mod version;

pub use config::{DEFAULT_CAPTURE_CAPACITY, EngineSettings, MappedDir, RuntimeConfig, WasiSettings};
pub use config_file::{ConfigFile, ConfigFileError, RunSection};
pub use error::{RuntimeError, WasiError};
pub use kinds::{CompilerKind, EngineKind, FeatureToggle, OutputPolicy, ParseKindError};
