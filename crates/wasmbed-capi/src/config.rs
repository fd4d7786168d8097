use tracing::warn;

use wasmbed_core::EngineConfig;

use crate::capabilities::{compiler_from_raw, engine_from_raw};
use crate::error::handle_result;
use crate::{
    declare_own, wasmbed_compiler_t, wasmbed_engine_t, wasmbed_features_t, wasmbed_target_t,
};

#[repr(C)]
#[derive(Clone)]
pub struct wasm_config_t {
    pub(crate) config: EngineConfig,
}

declare_own!(wasm_config_t, wasm_config_delete);

#[unsafe(no_mangle)]
pub extern "C" fn wasm_config_new() -> Box<wasm_config_t> {
    Box::new(wasm_config_t {
        config: EngineConfig::new(),
    })
}

/// Select the engine kind. Availability is checked by
/// `wasm_engine_new_with_config`.
#[unsafe(no_mangle)]
pub extern "C" fn wasm_config_set_engine(config: &mut wasm_config_t, engine: wasmbed_engine_t) {
    match engine_from_raw(engine) {
        Some(kind) => {
            config.config.set_engine(kind);
        }
        None => warn!(engine, "unknown engine kind ignored"),
    }
}

/// Select the compiler backend.
///
/// Returns `false` and records the last error in headless builds.
#[unsafe(no_mangle)]
pub extern "C" fn wasm_config_set_compiler(
    config: &mut wasm_config_t,
    compiler: wasmbed_compiler_t,
) -> bool {
    let Some(kind) = compiler_from_raw(compiler) else {
        wasmbed_common::last_error::record(format!("unknown compiler kind {compiler}"));
        return false;
    };
    handle_result(config.config.set_compiler(kind).map(|_| ())).is_some()
}

/// Attach proposal toggles, taking ownership of `features`.
#[unsafe(no_mangle)]
pub extern "C" fn wasm_config_set_features(
    config: &mut wasm_config_t,
    features: Box<wasmbed_features_t>,
) {
    config.config.set_features(features.features);
}

/// Attach a target, taking ownership of `target`.
#[unsafe(no_mangle)]
pub extern "C" fn wasm_config_set_target(config: &mut wasm_config_t, target: Box<wasmbed_target_t>) {
    config.config.set_target(target.target);
}
