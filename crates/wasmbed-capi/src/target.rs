use wasmbed_core::{CpuFeatureSet, TargetDescriptor, Triple};

use crate::error::handle_result;
use crate::{declare_own, wasm_name_t};

#[repr(C)]
pub struct wasmbed_triple_t {
    pub(crate) triple: Triple,
}

declare_own!(wasmbed_triple_t, wasmbed_triple_delete);

/// Parse `<arch>-<vendor>-<os>[-<env>]`.
///
/// Returns null and records the last error for malformed text.
#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_triple_new(triple: &wasm_name_t) -> Option<Box<wasmbed_triple_t>> {
    let Some(text) = triple.as_str() else {
        wasmbed_common::last_error::record("triple is not valid UTF-8");
        return None;
    };
    let triple = handle_result(text.parse::<Triple>())?;
    Some(Box::new(wasmbed_triple_t { triple }))
}

#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_triple_new_from_host() -> Box<wasmbed_triple_t> {
    Box::new(wasmbed_triple_t {
        triple: Triple::host(),
    })
}

/// Write the triple's text form into `out`.
#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_triple_to_string(triple: &wasmbed_triple_t, out: &mut wasm_name_t) {
    out.set_buffer(triple.triple.to_string().into_bytes());
}

#[repr(C)]
pub struct wasmbed_cpu_features_t {
    pub(crate) features: CpuFeatureSet,
}

declare_own!(wasmbed_cpu_features_t, wasmbed_cpu_features_delete);

#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_cpu_features_new() -> Box<wasmbed_cpu_features_t> {
    Box::new(wasmbed_cpu_features_t {
        features: CpuFeatureSet::new(),
    })
}

/// Add a CPU feature by name, e.g. `sse4.2`.
///
/// Returns `false` for unknown names. Whether the feature fits the target
/// architecture is only checked when an engine is created.
#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_cpu_features_add(
    cpu_features: &mut wasmbed_cpu_features_t,
    feature: &wasm_name_t,
) -> bool {
    feature
        .as_str()
        .is_some_and(|name| cpu_features.features.add(name))
}

#[repr(C)]
pub struct wasmbed_target_t {
    pub(crate) target: TargetDescriptor,
}

declare_own!(wasmbed_target_t, wasmbed_target_delete);

/// Combine a triple and CPU features, taking ownership of both.
///
/// Returns null if either is null.
#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_target_new(
    triple: Option<Box<wasmbed_triple_t>>,
    cpu_features: Option<Box<wasmbed_cpu_features_t>>,
) -> Option<Box<wasmbed_target_t>> {
    let triple = triple?;
    let cpu_features = cpu_features?;
    Some(Box::new(wasmbed_target_t {
        target: TargetDescriptor::new(triple.triple, cpu_features.features),
    }))
}
