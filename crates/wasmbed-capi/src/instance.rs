use wasmtime::Instance;

use wasmbed_core::instantiate;

use crate::error::handle_result;
use crate::{StoreRef, declare_own, wasm_extern_vec_t, wasm_module_t, wasm_store_t};

#[repr(C)]
#[derive(Clone)]
pub struct wasm_instance_t {
    pub(crate) store: StoreRef,
    pub(crate) instance: Instance,
}

declare_own!(wasm_instance_t, wasm_instance_delete);

/// Instantiate `module` with one extern per import, in import order.
///
/// Null slots are reported as unresolved. Returns null and records the last
/// error on failure.
#[unsafe(no_mangle)]
pub extern "C" fn wasm_instance_new(
    store: &mut wasm_store_t,
    module: &wasm_module_t,
    imports: &wasm_extern_vec_t,
) -> Option<Box<wasm_instance_t>> {
    let imports: Vec<_> = imports
        .as_slice()
        .iter()
        .map(|slot| slot.as_ref().map(|ext| ext.which.clone()))
        .collect();
    // SAFETY: the store is only reached through this call for its duration.
    let context = unsafe { store.store.context_mut() };
    let instance = handle_result(instantiate(context, &module.module, &imports))?;
    Some(Box::new(wasm_instance_t {
        store: store.store.clone(),
        instance,
    }))
}
