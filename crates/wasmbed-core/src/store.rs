//! Store data and store creation.
//!
//! Every [`Store`] created by wasmbed carries a [`HostState`]. Host functions
//! reach it through the [`wasmtime::Caller`] API.

use wasmtime::Store;
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::preview1::WasiP1Ctx;

use crate::WasmEngine;

/// Per-store host state.
///
/// # Contents
///
/// - `wasi`: WASI context serving `wasi_unstable` and
///   `wasi_snapshot_preview1` calls made by instances in this store
pub struct HostState {
    /// WASI context for system interface calls.
    wasi: WasiP1Ctx,
}

impl HostState {
    /// Host state with an empty WASI context: no arguments, no environment,
    /// no directories and closed standard streams.
    pub fn new() -> Self {
        Self {
            wasi: WasiCtxBuilder::new().build_p1(),
        }
    }

    /// Host state serving calls from `wasi`.
    pub fn with_wasi(wasi: WasiP1Ctx) -> Self {
        Self { wasi }
    }

    /// Mutable access to the WASI context, as required by the WASI linker
    /// functions.
    pub fn wasi_mut(&mut self) -> &mut WasiP1Ctx {
        &mut self.wasi
    }

    /// Replace the WASI context, returning the previous one.
    pub fn replace_wasi(&mut self, wasi: WasiP1Ctx) -> WasiP1Ctx {
        std::mem::replace(&mut self.wasi, wasi)
    }
}

impl Default for HostState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostState").finish_non_exhaustive()
    }
}

/// Create a new Wasmtime store on `engine` with default host state.
pub fn create_store(engine: &WasmEngine) -> Store<HostState> {
    Store::new(engine.inner(), HostState::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CapabilityRegistry, EngineConfig};
    use wasmbed_common::EngineKind;

    #[test]
    fn test_store_creation() {
        let mut config = EngineConfig::new();
        config.set_engine(EngineKind::Native);
        let engine = WasmEngine::with_registry(config, &CapabilityRegistry::headless()).unwrap();

        let mut store = create_store(&engine);
        let _ = store.data_mut().wasi_mut();
    }

    #[test]
    fn test_replace_wasi() {
        let mut state = HostState::default();
        let previous = state.replace_wasi(WasiCtxBuilder::new().arg("main").build_p1());
        drop(previous);

        assert!(format!("{state:?}").contains("HostState"));
    }
}
