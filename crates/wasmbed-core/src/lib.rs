//! Engine-side runtime for wasmbed.
//!
//! This crate provides the fundamental embedding capabilities:
//! - [`CapabilityRegistry`]: What this build can compile and run
//! - [`FeatureSet`], [`TargetDescriptor`]: Optional proposals and target machine
//! - [`EngineConfig`] and [`WasmEngine`]: Validated engine realization
//! - [`CompiledModule`]: Compiled WebAssembly module wrapper
//! - [`instantiate`] and [`run_entry_point`]: Instance lifecycle
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │   CapabilityRegistry ──gates──▶ EngineConfig            │
//! │   (FeatureSet, TargetDescriptor consumed by config)     │
//! └─────────────────────────────────────────────────────────┘
//!                            │ realize once
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                     WasmEngine                          │
//! │  - Compiler strategy, proposals, target flags           │
//! │  - precompile() for ahead-of-time artifacts             │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │      CompiledModule ──▶ Store<HostState> + Instance     │
//! │  - Imports resolved by wasmbed-wasi                     │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod capability;
pub mod engine;
pub mod features;
pub mod instance;
pub mod module;
pub mod store;
pub mod target;

pub use capability::{CapabilityRegistry, CapabilitySummary};
pub use engine::{EngineConfig, WasmEngine};
pub use features::FeatureSet;
pub use instance::{ExecutionResult, call_entry_point, instantiate, run_entry_point};
pub use module::{CompiledModule, ExportDescriptor, ExternKind, ImportDescriptor, wat2wasm};
pub use store::{HostState, create_store};
pub use target::{ArchFamily, CpuFeature, CpuFeatureSet, TargetDescriptor, Triple};
