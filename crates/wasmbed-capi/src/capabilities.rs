use wasmbed_common::{CompilerKind, EngineKind};
use wasmbed_core::CapabilityRegistry;

pub type wasmbed_compiler_t = u32;
pub const WASMBED_COMPILER_CRANELIFT: wasmbed_compiler_t = 0;
pub const WASMBED_COMPILER_LLVM: wasmbed_compiler_t = 1;
pub const WASMBED_COMPILER_SINGLEPASS: wasmbed_compiler_t = 2;

pub type wasmbed_engine_t = u32;
pub const WASMBED_ENGINE_JIT: wasmbed_engine_t = 0;
pub const WASMBED_ENGINE_NATIVE: wasmbed_engine_t = 1;
pub const WASMBED_ENGINE_OBJECT_FILE: wasmbed_engine_t = 2;

pub(crate) fn compiler_from_raw(raw: wasmbed_compiler_t) -> Option<CompilerKind> {
    match raw {
        WASMBED_COMPILER_CRANELIFT => Some(CompilerKind::Cranelift),
        WASMBED_COMPILER_LLVM => Some(CompilerKind::Llvm),
        WASMBED_COMPILER_SINGLEPASS => Some(CompilerKind::Singlepass),
        _ => None,
    }
}

pub(crate) fn engine_from_raw(raw: wasmbed_engine_t) -> Option<EngineKind> {
    match raw {
        WASMBED_ENGINE_JIT => Some(EngineKind::Jit),
        WASMBED_ENGINE_NATIVE => Some(EngineKind::Native),
        WASMBED_ENGINE_OBJECT_FILE => Some(EngineKind::ObjectFile),
        _ => None,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_is_compiler_available(compiler: wasmbed_compiler_t) -> bool {
    compiler_from_raw(compiler)
        .is_some_and(|kind| CapabilityRegistry::global().is_compiler_available(kind))
}

#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_is_engine_available(engine: wasmbed_engine_t) -> bool {
    engine_from_raw(engine).is_some_and(|kind| CapabilityRegistry::global().is_engine_available(kind))
}

#[unsafe(no_mangle)]
pub extern "C" fn wasmbed_is_headless() -> bool {
    CapabilityRegistry::global().is_headless()
}
