use wasmbed_core::CompiledModule;

use crate::error::handle_result;
use crate::{declare_own, wasm_byte_vec_t, wasm_name_t, wasm_store_t};

#[repr(C)]
#[derive(Clone)]
pub struct wasm_module_t {
    pub(crate) module: CompiledModule,
}

declare_own!(wasm_module_t, wasm_module_delete);

/// Compile a binary module for the store's engine.
///
/// Returns null and records the last error on failure.
#[unsafe(no_mangle)]
pub extern "C" fn wasm_module_new(
    store: &wasm_store_t,
    binary: &wasm_byte_vec_t,
) -> Option<Box<wasm_module_t>> {
    let module = handle_result(CompiledModule::from_bytes(&store.engine, binary.as_slice()))?;
    Some(Box::new(wasm_module_t { module }))
}

/// Load an artifact produced by `wasmbed_engine_precompile` or
/// `wasm_module_serialize`.
#[unsafe(no_mangle)]
pub extern "C" fn wasm_module_deserialize(
    store: &wasm_store_t,
    artifact: &wasm_byte_vec_t,
) -> Option<Box<wasm_module_t>> {
    let module = handle_result(CompiledModule::deserialize(&store.engine, artifact.as_slice()))?;
    Some(Box::new(wasm_module_t { module }))
}

#[unsafe(no_mangle)]
pub extern "C" fn wasm_module_serialize(module: &wasm_module_t, out: &mut wasm_byte_vec_t) {
    if let Some(bytes) = handle_result(module.module.serialize()) {
        out.set_buffer(bytes);
    }
}

/// Write the module's name into `out`, or an empty name if it has none.
#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_module_name(module: &wasm_module_t, out: &mut wasm_name_t) {
    let name = module.module.name().unwrap_or_default();
    out.set_buffer(name.as_bytes().to_vec());
}
