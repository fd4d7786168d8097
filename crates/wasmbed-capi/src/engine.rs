use wasmbed_common::EngineKind;
use wasmbed_core::{CapabilityRegistry, EngineConfig, WasmEngine};

use crate::error::handle_result;
use crate::{declare_own, wasm_byte_vec_t, wasm_config_t};

#[repr(C)]
#[derive(Clone)]
pub struct wasm_engine_t {
    pub(crate) engine: WasmEngine,
}

declare_own!(wasm_engine_t, wasm_engine_delete);

/// Create an engine with the default configuration.
///
/// Headless builds get a `Native` engine, others a JIT.
#[unsafe(no_mangle)]
pub extern "C" fn wasm_engine_new() -> Option<Box<wasm_engine_t>> {
    let mut config = EngineConfig::new();
    if CapabilityRegistry::global().is_headless() {
        config.set_engine(EngineKind::Native);
    }
    let engine = handle_result(WasmEngine::new(config))?;
    Some(Box::new(wasm_engine_t { engine }))
}

/// Create an engine from `config`, taking ownership of it.
///
/// Returns null and records the last error if the configuration cannot be
/// honored by this build.
#[unsafe(no_mangle)]
pub extern "C" fn wasm_engine_new_with_config(
    config: Box<wasm_config_t>,
) -> Option<Box<wasm_engine_t>> {
    let engine = handle_result(WasmEngine::new(config.config))?;
    Some(Box::new(wasm_engine_t { engine }))
}

/// Compile `binary` into an ahead-of-time artifact for the engine's target.
///
/// On failure `out` is left unchanged and the last error is recorded.
#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_engine_precompile(
    engine: &wasm_engine_t,
    binary: &wasm_byte_vec_t,
    out: &mut wasm_byte_vec_t,
) -> bool {
    match handle_result(engine.engine.precompile(binary.as_slice())) {
        Some(artifact) => {
            out.set_buffer(artifact);
            true
        }
        None => false,
    }
}
