use std::ffi::c_int;

use wasmtime::{Extern, Func};

use wasmbed_core::{ExecutionResult, ExternKind, call_entry_point};

use crate::error::handle_result;
use crate::{StoreRef, declare_own};

pub type wasm_externkind_t = u8;

pub const WASM_EXTERN_FUNC: wasm_externkind_t = 0;
pub const WASM_EXTERN_GLOBAL: wasm_externkind_t = 1;
pub const WASM_EXTERN_TABLE: wasm_externkind_t = 2;
pub const WASM_EXTERN_MEMORY: wasm_externkind_t = 3;

/// A host object tied to the store it lives in.
#[repr(C)]
#[derive(Clone)]
pub struct wasm_extern_t {
    pub(crate) store: StoreRef,
    pub(crate) which: Extern,
}

declare_own!(wasm_extern_t, wasm_extern_delete);

impl wasm_extern_t {
    pub(crate) fn new(store: StoreRef, which: Extern) -> Self {
        Self { store, which }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn wasm_extern_kind(e: &wasm_extern_t) -> wasm_externkind_t {
    match ExternKind::of_extern(&e.which) {
        ExternKind::Func => WASM_EXTERN_FUNC,
        ExternKind::Global => WASM_EXTERN_GLOBAL,
        ExternKind::Table => WASM_EXTERN_TABLE,
        ExternKind::Memory => WASM_EXTERN_MEMORY,
    }
}

#[repr(transparent)]
#[derive(Clone)]
pub struct wasm_func_t {
    pub(crate) ext: wasm_extern_t,
}

declare_own!(wasm_func_t, wasm_func_delete);

impl wasm_func_t {
    pub(crate) fn new(store: StoreRef, func: Func) -> Self {
        Self {
            ext: wasm_extern_t::new(store, Extern::Func(func)),
        }
    }

    fn func(&self) -> Option<&Func> {
        match &self.ext.which {
            Extern::Func(func) => Some(func),
            _ => None,
        }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn wasm_func_as_extern(f: &mut wasm_func_t) -> &mut wasm_extern_t {
    &mut f.ext
}

/// Call a function taking no parameters and returning nothing, such as a
/// WASI start function.
///
/// Returns `true` if the call returned or the guest exited through WASI,
/// storing the exit status (0 for a normal return) in `exit_code`. Returns
/// `false` and records the last error on traps and signature mismatches.
#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_func_call_void(func: &wasm_func_t, exit_code: &mut c_int) -> bool {
    let Some(callee) = func.func() else {
        wasmbed_common::last_error::record("extern is not a function");
        return false;
    };
    // SAFETY: the C API does not share a store between threads, and no
    // other reference into it is live during this call.
    let store = unsafe { func.ext.store.context_mut() };
    match handle_result(call_entry_point(store, callee)) {
        Some(ExecutionResult::Trap { message, .. }) => {
            wasmbed_common::last_error::record(message);
            false
        }
        Some(outcome) => {
            *exit_code = outcome.exit_code();
            true
        }
        None => false,
    }
}
