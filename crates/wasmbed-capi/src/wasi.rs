//! The `wasi_*` half of the C boundary.

use std::ffi::{c_char, c_int};

use tracing::warn;

use wasmbed_common::last_error;
use wasmbed_wasi::{
    NamedExtern, WasiEnvironment, WasiHostConfig, WasiVersion, detect_wasi_version,
    get_start_function, resolve_imports_named, resolve_imports_ordered,
};

use crate::error::handle_result;
use crate::{
    c_str, declare_own, wasm_extern_t, wasm_extern_vec_t, wasm_func_t, wasm_instance_t,
    wasm_module_t, wasm_name_t, wasm_store_t, wasmbed_named_extern_vec_t,
};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum wasi_version_t {
    INVALID_VERSION = -1,
    LATEST = 0,
    SNAPSHOT0 = 1,
    SNAPSHOT1 = 2,
}

impl From<WasiVersion> for wasi_version_t {
    fn from(version: WasiVersion) -> Self {
        match version {
            WasiVersion::Invalid => Self::INVALID_VERSION,
            WasiVersion::Latest => Self::LATEST,
            WasiVersion::Snapshot0 => Self::SNAPSHOT0,
            WasiVersion::Snapshot1 => Self::SNAPSHOT1,
        }
    }
}

#[repr(C)]
pub struct wasi_config_t {
    config: WasiHostConfig,
}

declare_own!(wasi_config_t, wasi_config_delete);

/// Start a configuration whose `argv[0]` is `program_name`.
///
/// # Safety
///
/// `program_name` must be null or a NUL-terminated string. Null and invalid
/// UTF-8 give a null configuration and record the last error.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wasi_config_new(program_name: *const c_char) -> Option<Box<wasi_config_t>> {
    // SAFETY: upheld by the caller.
    let Some(program_name) = (unsafe { c_str(program_name) }) else {
        last_error::record("program name is null or not valid UTF-8");
        return None;
    };
    Some(Box::new(wasi_config_t {
        config: WasiHostConfig::new(program_name),
    }))
}

/// # Safety
///
/// `arg` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wasi_config_arg(config: &mut wasi_config_t, arg: *const c_char) {
    // SAFETY: upheld by the caller.
    match unsafe { c_str(arg) } {
        Some(arg) => {
            config.config.arg(arg);
        }
        None => warn!("null or non-UTF-8 argument ignored"),
    }
}

/// # Safety
///
/// `key` and `value` must be null or NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wasi_config_env(
    config: &mut wasi_config_t,
    key: *const c_char,
    value: *const c_char,
) {
    // SAFETY: upheld by the caller.
    match unsafe { (c_str(key), c_str(value)) } {
        (Some(key), Some(value)) => {
            config.config.env(key, value);
        }
        _ => warn!("null or non-UTF-8 environment variable ignored"),
    }
}

/// Expose `dir` to the guest under the same path.
///
/// Returns `false` if the directory does not exist.
///
/// # Safety
///
/// `dir` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wasi_config_preopen_dir(
    config: &mut wasi_config_t,
    dir: *const c_char,
) -> bool {
    // SAFETY: upheld by the caller.
    unsafe { c_str(dir) }.is_some_and(|dir| config.config.preopen_dir(dir))
}

/// Expose `dir` to the guest as `alias`.
///
/// Returns `false` if the directory does not exist.
///
/// # Safety
///
/// `alias` and `dir` must be null or NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wasi_config_mapdir(
    config: &mut wasi_config_t,
    alias: *const c_char,
    dir: *const c_char,
) -> bool {
    // SAFETY: upheld by the caller.
    match unsafe { (c_str(alias), c_str(dir)) } {
        (Some(alias), Some(dir)) => config.config.map_dir(alias, dir),
        _ => false,
    }
}

macro_rules! stream_policies {
    ($($fn_name:ident => $method:ident,)*) => {$(
        #[unsafe(no_mangle)]
        pub extern "C" fn $fn_name(config: &mut wasi_config_t) {
            config.config.$method();
        }
    )*};
}

stream_policies! {
    wasi_config_inherit_stdin => inherit_stdin,
    wasi_config_ignore_stdin => ignore_stdin,
    wasi_config_inherit_stdout => inherit_stdout,
    wasi_config_capture_stdout => capture_stdout,
    wasi_config_ignore_stdout => ignore_stdout,
    wasi_config_inherit_stderr => inherit_stderr,
    wasi_config_capture_stderr => capture_stderr,
    wasi_config_ignore_stderr => ignore_stderr,
}

/// Resolve imports for `version` instead of detecting it per module.
#[unsafe(no_mangle)]
pub extern "C" fn wasi_config_set_version(config: &mut wasi_config_t, version: c_int) {
    config.config.version(WasiVersion::from_i32(version));
}

#[repr(C)]
pub struct wasi_env_t {
    env: WasiEnvironment,
}

declare_own!(wasi_env_t, wasi_env_delete);

/// Realize `config`, taking ownership of it.
///
/// Returns null and records the last error on failure.
#[unsafe(no_mangle)]
pub extern "C" fn wasi_env_new(config: Box<wasi_config_t>) -> Option<Box<wasi_env_t>> {
    let env = handle_result(WasiEnvironment::new(config.config))?;
    Some(Box::new(wasi_env_t { env }))
}

/// Move captured stdout into `buffer`.
///
/// Returns the number of bytes written, 0 when nothing is pending, and -1 if
/// stdout is not captured. Once everything pending was read, -1 also reports
/// guest output that was refused because the buffer was full; the last error
/// then describes the overflow.
///
/// # Safety
///
/// `buffer` must be valid for writes of `buffer_len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wasi_env_read_stdout(
    env: &mut wasi_env_t,
    buffer: *mut c_char,
    buffer_len: usize,
) -> isize {
    // SAFETY: upheld by the caller.
    let buffer = unsafe { out_buffer(buffer, buffer_len) };
    read_result(env.env.read_stdout(buffer))
}

/// Stderr counterpart of [`wasi_env_read_stdout`].
///
/// # Safety
///
/// `buffer` must be valid for writes of `buffer_len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wasi_env_read_stderr(
    env: &mut wasi_env_t,
    buffer: *mut c_char,
    buffer_len: usize,
) -> isize {
    // SAFETY: upheld by the caller.
    let buffer = unsafe { out_buffer(buffer, buffer_len) };
    read_result(env.env.read_stderr(buffer))
}

unsafe fn out_buffer<'a>(buffer: *mut c_char, len: usize) -> &'a mut [u8] {
    if buffer.is_null() || len == 0 {
        return &mut [];
    }
    // SAFETY: upheld by the caller.
    unsafe { std::slice::from_raw_parts_mut(buffer.cast::<u8>(), len) }
}

fn read_result(result: Result<usize, wasmbed_common::WasiError>) -> isize {
    match handle_result(result) {
        Some(read) => isize::try_from(read).unwrap_or(isize::MAX),
        None => -1,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn wasi_get_wasi_version(module: &wasm_module_t) -> wasi_version_t {
    detect_wasi_version(&module.module.imports()).into()
}

/// Fill `imports` with one slot per module import, in order. Slots the WASI
/// shims do not provide are null.
///
/// Returns `false` and records the last error if a recognized WASI import
/// cannot be produced; `imports` is left unchanged then.
#[unsafe(no_mangle)]
pub extern "C" fn wasi_get_imports(
    store: &mut wasm_store_t,
    module: &wasm_module_t,
    wasi_env: &wasi_env_t,
    imports: &mut wasm_extern_vec_t,
) -> bool {
    // SAFETY: the store is only reached through this call for its duration.
    let context = unsafe { store.store.context_mut() };
    let Some(resolved) = handle_result(resolve_imports_ordered(
        context,
        &module.module,
        &wasi_env.env,
    )) else {
        return false;
    };
    imports.set_buffer(
        resolved
            .into_iter()
            .map(|slot| slot.map(|ext| Box::new(wasm_extern_t::new(store.store.clone(), ext))))
            .collect(),
    );
    true
}

/// An extern with the namespace and name of the import it satisfies.
#[repr(C)]
#[derive(Clone)]
pub struct wasmbed_named_extern_t {
    module: wasm_name_t,
    name: wasm_name_t,
    r#extern: Box<wasm_extern_t>,
}

declare_own!(wasmbed_named_extern_t, wasmbed_named_extern_delete);

impl wasmbed_named_extern_t {
    fn new(store: &wasm_store_t, named: NamedExtern) -> Self {
        let module = named.module().as_bytes().to_vec().into();
        let name = named.name().as_bytes().to_vec().into();
        Self {
            module,
            name,
            r#extern: Box::new(wasm_extern_t::new(
                store.store.clone(),
                named.into_extern(),
            )),
        }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_named_extern_module(named_extern: &wasmbed_named_extern_t) -> &wasm_name_t {
    &named_extern.module
}

#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_named_extern_name(named_extern: &wasmbed_named_extern_t) -> &wasm_name_t {
    &named_extern.name
}

/// A new handle to the extern, owned by the caller.
#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_named_extern_unwrap(
    named_extern: &wasmbed_named_extern_t,
) -> Box<wasm_extern_t> {
    named_extern.r#extern.clone()
}

/// Fill `imports` with the module imports the WASI shims can satisfy.
///
/// Never fails; problems produce an empty vector.
#[unsafe(no_mangle)]
pub extern "C" fn wasi_get_unordered_imports(
    store: &mut wasm_store_t,
    module: &wasm_module_t,
    wasi_env: &wasi_env_t,
    imports: &mut wasmbed_named_extern_vec_t,
) -> bool {
    // SAFETY: the store is only reached through this call for its duration.
    let context = unsafe { store.store.context_mut() };
    let named = resolve_imports_named(context, &module.module, &wasi_env.env);
    imports.set_buffer(
        named
            .into_iter()
            .map(|named| Some(Box::new(wasmbed_named_extern_t::new(store, named))))
            .collect(),
    );
    true
}

/// The instance's `_start` export, or null.
#[unsafe(no_mangle)]
pub extern "C" fn wasi_get_start_function(
    instance: &mut wasm_instance_t,
) -> Option<Box<wasm_func_t>> {
    // SAFETY: the store is only reached through this call for its duration.
    let context = unsafe { instance.store.context_mut() };
    let func = get_start_function(context, &instance.instance)?;
    Some(Box::new(wasm_func_t::new(instance.store.clone(), func)))
}
