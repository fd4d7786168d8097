//! WASI host configuration and import resolution for wasmbed.
//!
//! # Flow
//!
//! 1. Describe the guest's view of the host with a [`WasiHostConfig`]
//! 2. Realize it once into a [`WasiEnvironment`]
//! 3. Match each module's imports against the WASI shims with an
//!    [`ImportResolver`], either in import order or by name
//! 4. Drain captured output with [`WasiEnvironment::read_stdout`] and
//!    [`WasiEnvironment::read_stderr`]
//!
//! # Versions
//!
//! Modules written against `wasi_unstable` (snapshot 0) and
//! `wasi_snapshot_preview1` (snapshot 1) are both served. The version is
//! detected from the module's imports unless the configuration pins one.

pub mod config;
pub mod env;
pub mod resolver;
pub mod version;

pub use config::{DirRequest, StdinSource, WasiHostConfig};
pub use env::WasiEnvironment;
pub use resolver::{
    ImportResolver, NamedExtern, START_FUNCTION, get_start_function, resolve_imports_named,
    resolve_imports_ordered,
};
pub use version::{
    SNAPSHOT0_NAMESPACE, SNAPSHOT1_NAMESPACE, WasiVersion, detect_wasi_version, is_wasi_namespace,
};
