//! WebAssembly module compilation and artifacts.
//!
//! This module provides [`CompiledModule`], a wrapper around Wasmtime's [`Module`]
//! that handles compilation, serialization, and deserialization of WebAssembly modules.
//!
//! # Compilation Strategies
//!
//! - **JIT**: Compile from Wasm bytes or text at runtime
//! - **AOT**: Precompile with [`WasmEngine::precompile`] (or
//!   [`CompiledModule::serialize`]) and load the artifact with a `Native` engine

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, instrument};
use wasmtime::{Extern, ExternType, Module};

use wasmbed_common::RuntimeError;

use crate::WasmEngine;

/// The kind of an import, an export, or a host object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternKind {
    Func,
    Global,
    Table,
    Memory,
}

impl ExternKind {
    /// Kind of a declared import or export type.
    pub fn of_type(ty: &ExternType) -> Self {
        match ty {
            ExternType::Func(_) => Self::Func,
            ExternType::Global(_) => Self::Global,
            ExternType::Table(_) => Self::Table,
            ExternType::Memory(_) => Self::Memory,
        }
    }

    /// Kind of a host object.
    pub fn of_extern(ext: &Extern) -> Self {
        match ext {
            Extern::Func(_) => Self::Func,
            Extern::Global(_) => Self::Global,
            Extern::Table(_) => Self::Table,
            Extern::Memory(_) | Extern::SharedMemory(_) => Self::Memory,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Func => "func",
            Self::Global => "global",
            Self::Table => "table",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for ExternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One import declared by a module, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDescriptor {
    /// Namespace the import is taken from.
    pub module: String,
    /// Name of the import within its namespace.
    pub name: String,
    /// Declared kind.
    pub kind: ExternKind,
}

/// One export of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDescriptor {
    pub name: String,
    pub kind: ExternKind,
}

/// A compiled WebAssembly module.
///
/// This struct wraps a Wasmtime [`Module`] with additional metadata for
/// caching and debugging purposes.
///
/// # Thread Safety
///
/// `CompiledModule` is thread-safe and can be instantiated in any number of
/// stores created on the engine that compiled it.
#[derive(Clone)]
pub struct CompiledModule {
    /// The compiled Wasmtime module.
    inner: Module,

    /// Hash of the original Wasm bytes, or the artifact's file stem.
    content_hash: String,

    /// When this module was compiled or loaded.
    compiled_at: Instant,
}

impl CompiledModule {
    /// Compile a module from WebAssembly binary bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot compile for this process or if
    /// compilation fails (e.g., invalid Wasm).
    #[instrument(skip(engine, bytes), fields(bytes_len = bytes.len()))]
    pub fn from_bytes(engine: &WasmEngine, bytes: &[u8]) -> Result<Self, RuntimeError> {
        let start = Instant::now();

        ensure_can_compile(engine)?;
        validate_wasm_header(bytes)?;

        let module = Module::new(engine.inner(), bytes).map_err(|e| {
            RuntimeError::compilation_failed(format!("Module compilation failed: {e:#}"))
        })?;

        let content_hash = compute_hash(bytes);
        info!(
            content_hash = %content_hash,
            duration_ms = start.elapsed().as_millis(),
            "Module compiled"
        );

        Ok(Self {
            inner: module,
            content_hash,
            compiled_at: Instant::now(),
        })
    }

    /// Compile a module from WAT (WebAssembly Text Format).
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not parse or compilation fails.
    #[instrument(skip(engine, wat))]
    pub fn from_wat(engine: &WasmEngine, wat: &str) -> Result<Self, RuntimeError> {
        let bytes = wat2wasm(wat.as_bytes())?;
        Self::from_bytes(engine, &bytes)
    }

    /// Compile a module from a `.wasm` or `.wat` file.
    pub fn from_file(engine: &WasmEngine, path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let source = std::fs::read(path)?;
        debug!(path = %path.display(), "Module source read");
        let bytes = wat2wasm(&source)?;
        Self::from_bytes(engine, &bytes)
    }

    /// Load a precompiled artifact from memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact is incompatible with the engine.
    #[allow(unsafe_code)]
    #[instrument(skip(engine, artifact), fields(artifact_len = artifact.len()))]
    pub fn deserialize(engine: &WasmEngine, artifact: &[u8]) -> Result<Self, RuntimeError> {
        ensure_can_load(engine)?;

        // SAFETY: artifacts are produced by `WasmEngine::precompile` and
        // Wasmtime checks their engine compatibility header before use.
        let module = unsafe { Module::deserialize(engine.inner(), artifact) }.map_err(|e| {
            RuntimeError::compilation_failed(format!("Failed to load precompiled module: {e:#}"))
        })?;

        debug!("Precompiled module loaded");

        Ok(Self {
            inner: module,
            content_hash: compute_hash(artifact),
            compiled_at: Instant::now(),
        })
    }

    /// Load a precompiled artifact from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be loaded or is incompatible.
    #[allow(unsafe_code)]
    #[instrument(skip(engine, path))]
    pub fn from_precompiled(
        engine: &WasmEngine,
        path: impl AsRef<Path>,
    ) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let start = Instant::now();
        ensure_can_load(engine)?;

        // SAFETY: same contract as `deserialize`.
        let module = unsafe { Module::deserialize_file(engine.inner(), path) }.map_err(|e| {
            RuntimeError::compilation_failed(format!(
                "Failed to load precompiled module from {}: {e:#}",
                path.display()
            ))
        })?;

        // The artifact holds no source bytes to hash; its file stem stands in.
        let content_hash = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        debug!(
            path = %path.display(),
            content_hash = %content_hash,
            duration_us = start.elapsed().as_micros(),
            "Precompiled module loaded"
        );

        Ok(Self {
            inner: module,
            content_hash,
            compiled_at: Instant::now(),
        })
    }

    /// Serialize the compiled module for AOT caching.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>, RuntimeError> {
        self.inner.serialize().map_err(|e| {
            RuntimeError::compilation_failed(format!("Module serialization failed: {e:#}"))
        })
    }

    /// The module's imports, in declaration order.
    pub fn imports(&self) -> Vec<ImportDescriptor> {
        self.inner
            .imports()
            .map(|import| ImportDescriptor {
                module: import.module().to_string(),
                name: import.name().to_string(),
                kind: ExternKind::of_type(&import.ty()),
            })
            .collect()
    }

    /// The module's exports, in declaration order.
    pub fn exports(&self) -> Vec<ExportDescriptor> {
        self.inner
            .exports()
            .map(|export| ExportDescriptor {
                name: export.name().to_string(),
                kind: ExternKind::of_type(&export.ty()),
            })
            .collect()
    }

    /// The name in the module's name section, if any.
    pub fn name(&self) -> Option<&str> {
        self.inner.name()
    }

    /// Get the content hash of the original Wasm bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Get when this module was compiled.
    pub fn compiled_at(&self) -> Instant {
        self.compiled_at
    }

    /// Get the inner Wasmtime module.
    pub fn inner(&self) -> &Module {
        &self.inner
    }
}

impl std::fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModule")
            .field("content_hash", &self.content_hash)
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Convert WebAssembly text to binary.
///
/// Input that is already binary is returned unchanged.
///
/// # Errors
///
/// Returns [`RuntimeError::TextFormat`] with the parser's diagnostic.
pub fn wat2wasm(source: &[u8]) -> Result<Vec<u8>, RuntimeError> {
    wat::parse_bytes(source)
        .map(|bytes| bytes.into_owned())
        .map_err(|e| RuntimeError::TextFormat {
            reason: e.to_string(),
        })
}

fn ensure_can_compile(engine: &WasmEngine) -> Result<(), RuntimeError> {
    if !engine.can_compile() {
        return Err(RuntimeError::unsupported(
            "compiling modules without a compiler backend; load a precompiled artifact instead",
        ));
    }
    if !engine.can_instantiate() {
        return Err(RuntimeError::unsupported(format!(
            "compiling modules for this process with engine `{}`; use precompile instead",
            engine.kind()
        )));
    }
    Ok(())
}

fn ensure_can_load(engine: &WasmEngine) -> Result<(), RuntimeError> {
    if !engine.can_instantiate() {
        return Err(RuntimeError::unsupported(format!(
            "loading artifacts with engine `{}`",
            engine.kind()
        )));
    }
    Ok(())
}

/// Validate WebAssembly header (magic number).
fn validate_wasm_header(bytes: &[u8]) -> Result<(), RuntimeError> {
    if bytes.len() < 8 {
        return Err(RuntimeError::compilation_failed(
            "Invalid Wasm: file too small",
        ));
    }

    // Check magic number: \0asm
    if &bytes[0..4] != b"\0asm" {
        return Err(RuntimeError::compilation_failed(
            "Invalid Wasm: bad magic number",
        ));
    }

    Ok(())
}

/// Compute a hash of the given bytes.
fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CapabilityRegistry, EngineConfig};
    use wasmbed_common::EngineKind;

    // Minimal valid Wasm module (empty module)
    const MINIMAL_WASM: &[u8] = &[
        0x00, 0x61, 0x73, 0x6d, // magic: \0asm
        0x01, 0x00, 0x00, 0x00, // version: 1
    ];

    const IMPORTS_WAT: &str = r#"
        (module $imports
          (import "wasi_snapshot_preview1" "fd_write" (func (param i32 i32 i32 i32) (result i32)))
          (import "env" "memory" (memory 1))
          (import "env" "counter" (global (mut i32)))
          (func (export "_start")))
    "#;

    fn jit_engine() -> Option<WasmEngine> {
        WasmEngine::new(EngineConfig::new()).ok()
    }

    #[test]
    fn test_validate_wasm_header_valid() {
        assert!(validate_wasm_header(MINIMAL_WASM).is_ok());
    }

    #[test]
    fn test_validate_wasm_header_too_small() {
        assert!(validate_wasm_header(&[0x00, 0x61]).is_err());
    }

    #[test]
    fn test_validate_wasm_header_bad_magic() {
        let bad_wasm = &[0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        assert!(validate_wasm_header(bad_wasm).is_err());
    }

    #[test]
    fn test_compute_hash() {
        let hash1 = compute_hash(b"hello");
        let hash2 = compute_hash(b"hello");
        let hash3 = compute_hash(b"world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 16); // 64-bit hex
    }

    #[test]
    fn test_wat2wasm() {
        let bytes = wat2wasm(b"(module)").unwrap();
        assert_eq!(bytes, MINIMAL_WASM);

        // Binary input passes through.
        assert_eq!(wat2wasm(MINIMAL_WASM).unwrap(), MINIMAL_WASM);
    }

    #[test]
    fn test_wat2wasm_error() {
        let err = wat2wasm(b"(module (func (result i32) (i32.const)))").unwrap_err();
        assert!(matches!(err, RuntimeError::TextFormat { .. }));
    }

    #[test]
    fn test_imports_in_order() {
        let Some(engine) = jit_engine() else { return };
        let module = CompiledModule::from_wat(&engine, IMPORTS_WAT).unwrap();

        let imports = module.imports();
        assert_eq!(imports.len(), 3);
        assert_eq!(imports[0].module, "wasi_snapshot_preview1");
        assert_eq!(imports[0].name, "fd_write");
        assert_eq!(imports[0].kind, ExternKind::Func);
        assert_eq!(imports[1].kind, ExternKind::Memory);
        assert_eq!(imports[2].kind, ExternKind::Global);

        let exports = module.exports();
        assert_eq!(exports[0].name, "_start");
        assert_eq!(module.name(), Some("imports"));
    }

    #[test]
    fn test_memory_kinds() {
        let Some(engine) = jit_engine() else { return };
        let module = CompiledModule::from_wat(
            &engine,
            r#"(module (memory (export "memory") 1) (table (export "table") 1 funcref))"#,
        )
        .unwrap();

        let kinds: Vec<_> = module.exports().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ExternKind::Memory, ExternKind::Table]);

        let mut store = crate::create_store(&engine);
        let memory = wasmtime::Memory::new(&mut store, wasmtime::MemoryType::new(1, None)).unwrap();
        assert_eq!(ExternKind::of_extern(&memory.into()), ExternKind::Memory);
    }

    #[test]
    fn test_headless_engine_cannot_compile() {
        let mut config = EngineConfig::new();
        config.set_engine(EngineKind::Native);
        let engine = WasmEngine::with_registry(config, &CapabilityRegistry::headless()).unwrap();

        let err = CompiledModule::from_bytes(&engine, MINIMAL_WASM).unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_precompile_roundtrip_through_native_engine() {
        let Some(engine) = jit_engine() else { return };
        let artifact = engine.precompile(MINIMAL_WASM).unwrap();

        let mut config = EngineConfig::new();
        config.set_engine(EngineKind::Native);
        let native = WasmEngine::new(config).unwrap();
        let module = CompiledModule::deserialize(&native, &artifact).unwrap();
        assert!(module.imports().is_empty());
    }

    #[test]
    fn test_module_debug() {
        let Some(engine) = jit_engine() else { return };
        let module = CompiledModule::from_bytes(&engine, MINIMAL_WASM).unwrap();

        let debug_str = format!("{module:?}");
        assert!(debug_str.contains("CompiledModule"));
        assert!(debug_str.contains("content_hash"));
    }
}
