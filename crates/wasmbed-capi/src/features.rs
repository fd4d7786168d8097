use std::ffi::c_char;

use wasmbed_common::FeatureToggle;
use wasmbed_core::FeatureSet;

use crate::{c_str, declare_own};

/// Proposal toggles, all disabled when created.
#[repr(C)]
#[derive(Clone)]
pub struct wasmbed_features_t {
    pub(crate) features: FeatureSet,
}

declare_own!(wasmbed_features_t, wasmbed_features_delete);

#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_features_new() -> Box<wasmbed_features_t> {
    Box::new(wasmbed_features_t {
        features: FeatureSet::new(),
    })
}

/// Set a toggle by its kebab-case name, e.g. `bulk-memory`.
///
/// Returns `false`, changing nothing, for unknown or unsupported names.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wasmbed_features_set(
    features: &mut wasmbed_features_t,
    name: *const c_char,
    enable: bool,
) -> bool {
    // SAFETY: upheld by the caller.
    match unsafe { c_str(name) } {
        Some(name) => features.features.set_by_name(name, enable),
        None => false,
    }
}

macro_rules! feature_setters {
    ($($fn_name:ident => $toggle:ident,)*) => {$(
        #[unsafe(no_mangle)]
        pub extern "C" fn $fn_name(features: &mut wasmbed_features_t, enable: bool) -> bool {
            features.features.set(FeatureToggle::$toggle, enable)
        }
    )*};
}

feature_setters! {
    wasmbed_features_bulk_memory => BulkMemory,
    wasmbed_features_memory64 => Memory64,
    wasmbed_features_module_linking => ModuleLinking,
    wasmbed_features_multi_memory => MultiMemory,
    wasmbed_features_multi_value => MultiValue,
    wasmbed_features_reference_types => ReferenceTypes,
    wasmbed_features_simd => Simd,
    wasmbed_features_tail_call => TailCall,
    wasmbed_features_threads => Threads,
}
