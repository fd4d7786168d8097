//! C boundary for wasmbed.
//!
//! This crate is normally not used from Rust; it is compiled as a cdylib or
//! staticlib and driven from C. Every value crossing the boundary is a
//! `Box`-owned object: `*_new` hands ownership to the caller, `*_delete`
//! takes it back. Functions that consume an argument (for example
//! `wasm_config_set_features`) take the `Box` by value.
//!
//! Failures are reported by a null or `false` return. When the cause is not
//! evident from the inputs, a message is recorded first and can be read with
//! [`wasmbed_last_error_length`] and [`wasmbed_last_error_message`].

#![allow(unsafe_code)]
#![allow(non_camel_case_types, reason = "matching C style, not Rust")]
#![allow(clippy::missing_safety_doc)]

use std::ffi::{CStr, c_char};

mod capabilities;
mod config;
mod engine;
mod error;
mod r#extern;
mod features;
mod instance;
mod module;
mod store;
mod target;
mod vec;
mod version;
mod wasi;
mod wat2wasm;

pub use crate::capabilities::*;
pub use crate::config::*;
pub use crate::engine::*;
pub use crate::error::*;
pub use crate::r#extern::*;
pub use crate::features::*;
pub use crate::instance::*;
pub use crate::module::*;
pub use crate::store::*;
pub use crate::target::*;
pub use crate::vec::*;
pub use crate::version::*;
pub use crate::wasi::*;
pub use crate::wat2wasm::*;

/// Define `$delete`, which releases an owned `$ty`. Null is accepted.
macro_rules! declare_own {
    ($ty:ident, $delete:ident) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn $delete(_: Option<Box<$ty>>) {}
    };
}
pub(crate) use declare_own;

/// Borrow a NUL-terminated C string as UTF-8.
///
/// Returns `None` for null pointers and invalid UTF-8.
///
/// # Safety
///
/// A non-null `ptr` must point to a NUL-terminated string that outlives `'a`.
pub(crate) unsafe fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: upheld by the caller.
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}
