use std::cell::UnsafeCell;
use std::sync::Arc;

use wasmtime::Store;

use wasmbed_core::{HostState, WasmEngine, create_store};

use crate::{declare_own, wasm_engine_t};

/// Shared handle to a store.
///
/// Objects living in a store (instances, externs) keep a handle so they can
/// be used without passing the store again.
#[derive(Clone)]
pub struct StoreRef {
    store: Arc<UnsafeCell<Store<HostState>>>,
}

impl StoreRef {
    /// # Safety
    ///
    /// The C API is single-threaded per store; the caller must not hold
    /// another reference obtained from this handle or its clones.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn context_mut(&self) -> &mut Store<HostState> {
        // SAFETY: upheld by the caller.
        unsafe { &mut *self.store.get() }
    }
}

#[repr(C)]
#[derive(Clone)]
pub struct wasm_store_t {
    pub(crate) store: StoreRef,
    pub(crate) engine: WasmEngine,
}

declare_own!(wasm_store_t, wasm_store_delete);

#[unsafe(no_mangle)]
pub extern "C" fn wasm_store_new(engine: &wasm_engine_t) -> Box<wasm_store_t> {
    let store = create_store(&engine.engine);
    Box::new(wasm_store_t {
        store: StoreRef {
            store: Arc::new(UnsafeCell::new(store)),
        },
        engine: engine.engine.clone(),
    })
}
