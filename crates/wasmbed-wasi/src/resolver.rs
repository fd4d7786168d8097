//! Matching a module's imports against the WASI shims.
//!
//! Only imports from the namespace of the resolved WASI version are
//! considered, and only names the shims actually define are recognized.
//! Everything else is left for the embedder.

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};
use wasmtime::{Engine, Extern, Func, Instance, Linker, Store};
use wasmtime_wasi::{preview0, preview1};

use wasmbed_common::{RuntimeError, WasiError};
use wasmbed_core::{CompiledModule, ExternKind, HostState, ImportDescriptor};

use crate::env::WasiEnvironment;
use crate::version::{WasiVersion, detect_wasi_version};

/// Export name of the WASI command entry point.
pub const START_FUNCTION: &str = "_start";

/// A host object together with the import it satisfies.
#[derive(Debug, Clone)]
pub struct NamedExtern {
    module: String,
    name: String,
    ext: Extern,
}

impl NamedExtern {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ext(&self) -> &Extern {
        &self.ext
    }

    pub fn kind(&self) -> ExternKind {
        ExternKind::of_extern(&self.ext)
    }

    pub fn into_extern(self) -> Extern {
        self.ext
    }
}

/// WASI shims for both snapshots, defined once per engine.
pub struct ImportResolver {
    linker: Linker<HostState>,
}

impl ImportResolver {
    /// Define the `wasi_unstable` and `wasi_snapshot_preview1` shims.
    ///
    /// # Errors
    ///
    /// Returns an error if the shims cannot be registered.
    pub fn new(engine: &Engine) -> Result<Self, RuntimeError> {
        let mut linker = Linker::new(engine);
        preview1::add_to_linker_sync(&mut linker, HostState::wasi_mut).map_err(|e| {
            WasiError::initialization_failed(format!("Failed to define snapshot1 shims: {e:#}"))
        })?;
        preview0::add_to_linker_sync(&mut linker, HostState::wasi_mut).map_err(|e| {
            WasiError::initialization_failed(format!("Failed to define snapshot0 shims: {e:#}"))
        })?;
        Ok(Self { linker })
    }

    /// Resolve every import of `module`, in order.
    ///
    /// The result has one slot per import. Recognized WASI imports are
    /// filled; the others stay `None` for the embedder to provide. The store
    /// gets a fresh WASI context from `environment`.
    ///
    /// # Errors
    ///
    /// Fails naming the import if a recognized WASI import cannot be
    /// produced, either because its declared kind differs from the shim or
    /// because the WASI context cannot be realized.
    #[instrument(skip_all, fields(module = %module.content_hash()))]
    pub fn resolve_ordered(
        &self,
        store: &mut Store<HostState>,
        module: &CompiledModule,
        environment: &WasiEnvironment,
    ) -> Result<Vec<Option<Extern>>, RuntimeError> {
        self.ensure_same_engine(store)?;
        let imports = module.imports();
        let namespace = resolution_version(environment, &imports).namespace();

        let mut realized = false;
        let mut resolved = Vec::with_capacity(imports.len());
        for (index, import) in imports.iter().enumerate() {
            let Some(ext) = self.shim_for(store, namespace, import) else {
                resolved.push(None);
                continue;
            };
            let unavailable = |reason: String| WasiError::ImportUnavailable {
                index,
                module: import.module.clone(),
                name: import.name.clone(),
                reason,
            };

            let provided = ExternKind::of_extern(&ext);
            if provided != import.kind {
                return Err(unavailable(format!(
                    "declared as {}, provided as {provided}",
                    import.kind
                ))
                .into());
            }
            if !realized {
                let ctx = environment
                    .realize()
                    .map_err(|e| unavailable(e.to_string()))?;
                store.data_mut().replace_wasi(ctx);
                realized = true;
            }
            resolved.push(Some(ext));
        }

        info!(
            imports = imports.len(),
            resolved = resolved.iter().filter(|slot| slot.is_some()).count(),
            "Imports resolved"
        );
        Ok(resolved)
    }

    /// Resolve the imports of `module` that the environment can satisfy.
    ///
    /// Never fails: problems are logged and produce an empty result. Entries
    /// follow the module's import order without repeating a
    /// (namespace, name) pair.
    #[instrument(skip_all, fields(module = %module.content_hash()))]
    pub fn resolve_named(
        &self,
        store: &mut Store<HostState>,
        module: &CompiledModule,
        environment: &WasiEnvironment,
    ) -> Vec<NamedExtern> {
        if let Err(e) = self.ensure_same_engine(store) {
            warn!(error = %e, "Named import resolution skipped");
            return Vec::new();
        }
        let imports = module.imports();
        let namespace = resolution_version(environment, &imports).namespace();

        let mut seen = HashSet::new();
        let mut named = Vec::new();
        for import in &imports {
            if !seen.insert((import.module.as_str(), import.name.as_str())) {
                continue;
            }
            let Some(ext) = self.shim_for(store, namespace, import) else {
                continue;
            };
            if ExternKind::of_extern(&ext) != import.kind {
                warn!(
                    module = %import.module,
                    name = %import.name,
                    kind = %import.kind,
                    "WASI import skipped: kind mismatch"
                );
                continue;
            }
            named.push(NamedExtern {
                module: import.module.clone(),
                name: import.name.clone(),
                ext,
            });
        }

        if !named.is_empty() {
            match environment.realize() {
                Ok(ctx) => {
                    store.data_mut().replace_wasi(ctx);
                }
                Err(e) => {
                    warn!(error = %e, "Named import resolution failed");
                    return Vec::new();
                }
            }
        }
        named
    }

    fn shim_for(
        &self,
        store: &mut Store<HostState>,
        namespace: Option<&str>,
        import: &ImportDescriptor,
    ) -> Option<Extern> {
        if namespace != Some(import.module.as_str()) {
            return None;
        }
        let ext = self
            .linker
            .get(&mut *store, &import.module, &import.name);
        if ext.is_none() {
            debug!(
                module = %import.module,
                name = %import.name,
                "Not a WASI function; left for the embedder"
            );
        }
        ext
    }

    fn ensure_same_engine(&self, store: &Store<HostState>) -> Result<(), RuntimeError> {
        if Engine::same(self.linker.engine(), store.engine()) {
            Ok(())
        } else {
            Err(RuntimeError::invalid_config(
                "store and import resolver belong to different engines",
            ))
        }
    }
}

impl std::fmt::Debug for ImportResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportResolver").finish_non_exhaustive()
    }
}

/// The version imports are resolved for: the pinned one, else the detected one.
fn resolution_version(environment: &WasiEnvironment, imports: &[ImportDescriptor]) -> WasiVersion {
    let version = environment
        .version()
        .unwrap_or_else(|| detect_wasi_version(imports))
        .resolve();
    debug!(version = %version, "WASI version selected");
    version
}

/// [`ImportResolver::resolve_ordered`] with shims defined for the store's engine.
pub fn resolve_imports_ordered(
    store: &mut Store<HostState>,
    module: &CompiledModule,
    environment: &WasiEnvironment,
) -> Result<Vec<Option<Extern>>, RuntimeError> {
    let resolver = ImportResolver::new(store.engine())?;
    resolver.resolve_ordered(store, module, environment)
}

/// [`ImportResolver::resolve_named`] with shims defined for the store's engine.
pub fn resolve_imports_named(
    store: &mut Store<HostState>,
    module: &CompiledModule,
    environment: &WasiEnvironment,
) -> Vec<NamedExtern> {
    match ImportResolver::new(store.engine()) {
        Ok(resolver) => resolver.resolve_named(store, module, environment),
        Err(e) => {
            warn!(error = %e, "Named import resolution failed");
            Vec::new()
        }
    }
}

/// The instance's WASI entry point, if it exports one.
pub fn get_start_function(store: &mut Store<HostState>, instance: &Instance) -> Option<Func> {
    instance.get_func(&mut *store, START_FUNCTION)
}
