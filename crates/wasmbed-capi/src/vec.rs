use std::mem;
use std::ptr;
use std::slice;

use crate::{wasm_extern_t, wasmbed_named_extern_t};

pub type wasm_byte_t = u8;
pub type wasm_name_t = wasm_byte_vec_t;

impl wasm_name_t {
    /// The bytes as UTF-8 text, `None` if they are not valid UTF-8.
    pub(crate) fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_slice()).ok()
    }
}

macro_rules! declare_vecs {
    (
        $((
            name: $name:ident,
            ty: $elem_ty:ty,
            new: $new:ident,
            empty: $empty:ident,
            uninit: $uninit:ident,
            copy: $copy:ident,
            delete: $delete:ident,
        ))*
    ) => {$(
        /// Owned `{size, data}` vector. The capacity always equals `size`.
        #[repr(C)]
        pub struct $name {
            size: usize,
            data: *mut $elem_ty,
        }

        impl $name {
            /// Replace the contents, releasing the previous elements.
            pub fn set_buffer(&mut self, buffer: Vec<$elem_ty>) {
                drop(self.take());
                let mut vec = buffer.into_boxed_slice();
                self.size = vec.len();
                self.data = vec.as_mut_ptr();
                mem::forget(vec);
            }

            pub fn as_slice(&self) -> &[$elem_ty] {
                if self.size == 0 {
                    &[]
                } else {
                    // SAFETY: `data` was produced by `set_buffer` or by the
                    // embedder with `size` initialized elements.
                    unsafe { slice::from_raw_parts(self.data, self.size) }
                }
            }

            pub fn take(&mut self) -> Vec<$elem_ty> {
                if self.data.is_null() {
                    return Vec::new();
                }
                // SAFETY: the buffer is a boxed slice of exactly `size`
                // elements, leaked by `set_buffer`.
                let vec = unsafe { Vec::from_raw_parts(self.data, self.size, self.size) };
                self.size = 0;
                self.data = ptr::null_mut();
                vec
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                self.as_slice().to_vec().into()
            }
        }

        impl From<Vec<$elem_ty>> for $name {
            fn from(vec: Vec<$elem_ty>) -> Self {
                let mut out = $name {
                    size: 0,
                    data: ptr::null_mut(),
                };
                out.set_buffer(vec);
                out
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Vec::new().into()
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                drop(self.take());
            }
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn $empty(out: &mut mem::MaybeUninit<$name>) {
            out.write(Vec::new().into());
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn $uninit(out: &mut mem::MaybeUninit<$name>, size: usize) {
            out.write(vec![Default::default(); size].into());
        }

        /// Take ownership of `size` elements starting at `data`.
        ///
        /// # Safety
        ///
        /// `data` must point to `size` initialized elements, which the caller
        /// must not use afterwards.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $new(
            out: &mut mem::MaybeUninit<$name>,
            size: usize,
            data: *const $elem_ty,
        ) {
            let vec = (0..size)
                .map(|i| unsafe { data.add(i).read() })
                .collect::<Vec<_>>();
            out.write(vec.into());
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn $copy(out: &mut mem::MaybeUninit<$name>, src: &$name) {
            out.write(src.clone());
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn $delete(out: &mut $name) {
            out.take();
        }
    )*};
}

declare_vecs! {
    (
        name: wasm_byte_vec_t,
        ty: wasm_byte_t,
        new: wasm_byte_vec_new,
        empty: wasm_byte_vec_new_empty,
        uninit: wasm_byte_vec_new_uninitialized,
        copy: wasm_byte_vec_copy,
        delete: wasm_byte_vec_delete,
    )
    (
        name: wasm_extern_vec_t,
        ty: Option<Box<wasm_extern_t>>,
        new: wasm_extern_vec_new,
        empty: wasm_extern_vec_new_empty,
        uninit: wasm_extern_vec_new_uninitialized,
        copy: wasm_extern_vec_copy,
        delete: wasm_extern_vec_delete,
    )
    (
        name: wasmbed_named_extern_vec_t,
        ty: Option<Box<wasmbed_named_extern_t>>,
        new: wasmbed_named_extern_vec_new,
        empty: wasmbed_named_extern_vec_new_empty,
        uninit: wasmbed_named_extern_vec_new_uninitialized,
        copy: wasmbed_named_extern_vec_copy,
        delete: wasmbed_named_extern_vec_delete,
    )
}
