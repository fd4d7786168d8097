//! Integration tests for wasmbed-core.
//!
//! These tests verify the complete engine pipeline:
//! - Configuration realization against the build's capabilities
//! - WAT compilation to module
//! - Instantiation with host-provided imports
//! - Entry-point execution and outcome classification
//! - Precompiled artifacts

#![cfg(any(feature = "cranelift", feature = "winch"))]

use wasmbed_common::{EngineKind, FeatureToggle, RuntimeError};
use wasmbed_core::{
    CompiledModule, CpuFeatureSet, EngineConfig, ExecutionResult, FeatureSet, TargetDescriptor,
    Triple, WasmEngine, create_store, instantiate, run_entry_point,
};
use wasmtime::{Extern, Func};

fn jit_engine() -> WasmEngine {
    WasmEngine::new(EngineConfig::new()).unwrap()
}

// ============================================================================
// Test: Basic Execution
// ============================================================================

#[test]
fn test_basic_execution() {
    let wat = r#"
        (module
            (func (export "_start"))
        )
    "#;

    let engine = jit_engine();
    let compiled = CompiledModule::from_wat(&engine, wat).unwrap();
    let mut store = create_store(&engine);

    let instance = instantiate(&mut store, &compiled, &[]).unwrap();
    let result = run_entry_point(&mut store, &instance, "_start").unwrap();

    assert!(result.is_success());
}

// ============================================================================
// Test: Trap Handling
// ============================================================================

#[test]
fn test_trap_handling() {
    let wat = r#"
        (module
            (func (export "_start")
                unreachable
            )
        )
    "#;

    let engine = jit_engine();
    let compiled = CompiledModule::from_wat(&engine, wat).unwrap();
    let mut store = create_store(&engine);

    let instance = instantiate(&mut store, &compiled, &[]).unwrap();
    let result = run_entry_point(&mut store, &instance, "_start").unwrap();

    match result {
        ExecutionResult::Trap { message, code } => {
            assert!(message.contains("unreachable"));
            assert!(code.is_some());
        }
        other => panic!("Expected trap, got {other:?}"),
    }
}

#[test]
fn test_missing_entry_point() {
    let engine = jit_engine();
    let compiled = CompiledModule::from_wat(&engine, "(module)").unwrap();
    let mut store = create_store(&engine);

    let instance = instantiate(&mut store, &compiled, &[]).unwrap();
    let err = run_entry_point(&mut store, &instance, "_start").unwrap_err();

    assert!(matches!(err, RuntimeError::ExportNotFound { ref name } if name == "_start"));
}

// ============================================================================
// Test: Host Imports
// ============================================================================

#[test]
fn test_host_function_import() {
    let wat = r#"
        (module
            (import "env" "tick" (func $tick))
            (func (export "_start")
                call $tick
                call $tick
            )
        )
    "#;

    let engine = jit_engine();
    let compiled = CompiledModule::from_wat(&engine, wat).unwrap();
    let mut store = create_store(&engine);

    let ticks = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter = ticks.clone();
    let tick = Func::wrap(&mut store, move || {
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });

    let instance = instantiate(&mut store, &compiled, &[Some(Extern::Func(tick))]).unwrap();
    let result = run_entry_point(&mut store, &instance, "_start").unwrap();

    assert!(result.is_success());
    assert_eq!(ticks.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[test]
fn test_unresolved_import_is_named() {
    let wat = r#"
        (module
            (import "env" "tick" (func))
        )
    "#;

    let engine = jit_engine();
    let compiled = CompiledModule::from_wat(&engine, wat).unwrap();
    let mut store = create_store(&engine);

    let err = instantiate(&mut store, &compiled, &[None]).unwrap_err();
    assert!(err.to_string().contains("\"env\" \"tick\""));

    let err = instantiate(&mut store, &compiled, &[]).unwrap_err();
    assert!(err.to_string().contains("1 imports, 0 provided"));
}

// ============================================================================
// Test: Feature Toggles
// ============================================================================

#[test]
fn test_disabled_proposal_rejects_module() {
    let wat = r#"
        (module
            (func (export "_start")
                (drop (i32x4.splat (i32.const 1)))
            )
        )
    "#;

    let mut features = FeatureSet::new();
    features.set(FeatureToggle::BulkMemory, true);
    features.set(FeatureToggle::MultiValue, true);
    let mut config = EngineConfig::new();
    config.set_features(features);
    let engine = WasmEngine::new(config).unwrap();

    let err = CompiledModule::from_wat(&engine, wat).unwrap_err();
    assert!(matches!(err, RuntimeError::CompilationFailed { .. }));
}

#[test]
fn test_enabled_proposal_accepts_module() {
    let wat = r#"
        (module
            (func (export "_start")
                (drop (i32x4.splat (i32.const 1)))
            )
        )
    "#;

    let mut features = FeatureSet::new();
    for toggle in [
        FeatureToggle::BulkMemory,
        FeatureToggle::MultiValue,
        FeatureToggle::Simd,
    ] {
        assert!(features.set(toggle, true));
    }
    let mut config = EngineConfig::new();
    config.set_features(features);
    let engine = WasmEngine::new(config).unwrap();

    assert!(CompiledModule::from_wat(&engine, wat).is_ok());
}

// ============================================================================
// Test: Targets and Artifacts
// ============================================================================

#[test]
fn test_host_target_reports_host_triple() {
    let target = TargetDescriptor::new(Triple::host(), CpuFeatureSet::new());
    assert_eq!(target.triple().to_string(), Triple::host().to_string());
    assert!(target.is_host());

    let mut config = EngineConfig::new();
    config.set_target(target);
    let engine = WasmEngine::new(config).unwrap();
    assert_eq!(engine.target().triple(), &Triple::host());
}

#[test]
fn test_cross_compile_object_file() {
    let foreign: Triple = if cfg!(target_arch = "aarch64") {
        "x86_64-unknown-linux-gnu".parse().unwrap()
    } else {
        "aarch64-unknown-linux-gnu".parse().unwrap()
    };

    let mut config = EngineConfig::new();
    config
        .set_engine(EngineKind::ObjectFile)
        .set_target(TargetDescriptor::new(foreign, CpuFeatureSet::new()));
    let engine = WasmEngine::new(config).unwrap();

    assert!(!engine.can_instantiate());
    let artifact = engine.precompile(b"(module (func (export \"_start\")))").unwrap();
    assert!(!artifact.is_empty());

    let err = CompiledModule::from_wat(&engine, "(module)").unwrap_err();
    assert!(err.is_unsupported());
}

#[test]
fn test_precompiled_artifact_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("start.cwasm");

    let engine = jit_engine();
    let compiled =
        CompiledModule::from_wat(&engine, r#"(module (func (export "_start")))"#).unwrap();
    std::fs::write(&path, compiled.serialize().unwrap()).unwrap();

    let mut config = EngineConfig::new();
    config.set_engine(EngineKind::Native);
    let native = WasmEngine::new(config).unwrap();
    let loaded = CompiledModule::from_precompiled(&native, &path).unwrap();
    assert_eq!(loaded.content_hash(), "start");

    let mut store = create_store(&native);
    let instance = instantiate(&mut store, &loaded, &[]).unwrap();
    assert!(run_entry_point(&mut store, &instance, "_start").unwrap().is_success());
}
