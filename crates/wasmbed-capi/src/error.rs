use std::ffi::{c_char, c_int};

use wasmbed_common::last_error;

/// Unwrap `result`, recording an error as the calling thread's last error.
pub(crate) fn handle_result<T, E: std::fmt::Display>(result: Result<T, E>) -> Option<T> {
    last_error::record_err(result).ok()
}

/// Length of the last error message including the trailing NUL, 0 if no
/// error was recorded on this thread.
#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_last_error_length() -> c_int {
    c_int::try_from(last_error::length()).unwrap_or(c_int::MAX)
}

/// Copy the last error message, NUL-terminated, into `buffer`.
///
/// Returns the number of bytes written including the NUL, 0 if no error was
/// recorded, and -1 if `buffer` is null or shorter than
/// [`wasmbed_last_error_length`]. Reading does not clear the message.
///
/// # Safety
///
/// `buffer` must be valid for writes of `length` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wasmbed_last_error_message(buffer: *mut c_char, length: c_int) -> c_int {
    let Ok(length) = usize::try_from(length) else {
        return -1;
    };
    if buffer.is_null() {
        return -1;
    }
    // SAFETY: upheld by the caller.
    let buffer = unsafe { std::slice::from_raw_parts_mut(buffer.cast::<u8>(), length) };
    match last_error::copy_into(buffer) {
        Some(written) => c_int::try_from(written).unwrap_or(-1),
        None => -1,
    }
}
