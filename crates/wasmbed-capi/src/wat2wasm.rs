use crate::error::handle_result;
use crate::wasm_byte_vec_t;

/// Convert WebAssembly text in `wat` to binary, replacing the contents of
/// `out`.
///
/// On failure `out` is left unchanged and the last error is recorded.
#[unsafe(no_mangle)]
pub extern "C" fn wat2wasm(wat: &wasm_byte_vec_t, out: &mut wasm_byte_vec_t) {
    if let Some(binary) = handle_result(wasmbed_core::wat2wasm(wat.as_slice())) {
        out.set_buffer(binary);
    }
}
