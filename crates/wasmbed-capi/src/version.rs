use std::ffi::{CString, c_char};
use std::sync::OnceLock;

use wasmbed_common::version;

static VERSION: OnceLock<CString> = OnceLock::new();
static PRE: OnceLock<CString> = OnceLock::new();

/// Full version of this build, e.g. `0.3.0`. The string is static.
#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_version() -> *const c_char {
    VERSION
        .get_or_init(|| CString::new(version::VERSION).unwrap_or_default())
        .as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_version_major() -> u8 {
    version::major()
}

#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_version_minor() -> u8 {
    version::minor()
}

#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_version_patch() -> u8 {
    version::patch()
}

/// Pre-release tag of this build, empty for releases. The string is static.
#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_version_pre() -> *const c_char {
    PRE.get_or_init(|| CString::new(version::PRE).unwrap_or_default())
        .as_ptr()
}
