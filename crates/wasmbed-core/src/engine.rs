//! Engine configuration and realization.
//!
//! An [`EngineConfig`] gathers the engine kind, compiler, proposal toggles
//! and target. It is mutated freely and checked only once, when it is
//! consumed by [`WasmEngine::new`]. Combinations the build cannot honor are
//! rejected there, never replaced by something else.

use tracing::{debug, info, instrument};
use wasmtime::{Config, Engine};

use wasmbed_common::{CompilerKind, EngineKind, EngineSettings, RuntimeError};

use crate::capability::CapabilityRegistry;
use crate::features::FeatureSet;
use crate::target::{CpuFeatureSet, TargetDescriptor, Triple};

/// Engine configuration, consumed once to realize a [`WasmEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    engine: EngineKind,
    compiler: Option<CompilerKind>,
    features: Option<FeatureSet>,
    target: Option<TargetDescriptor>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Jit,
            compiler: None,
            features: None,
            target: None,
        }
    }
}

impl EngineConfig {
    /// A JIT configuration for the host with the engine's default proposals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the engine kind.
    ///
    /// Availability is checked when the configuration is realized.
    pub fn set_engine(&mut self, kind: EngineKind) -> &mut Self {
        self.engine = kind;
        self
    }

    /// Select the compiler backend.
    ///
    /// # Errors
    ///
    /// Fails in headless builds, where no compiler can ever be selected.
    pub fn set_compiler(&mut self, kind: CompilerKind) -> Result<&mut Self, RuntimeError> {
        if CapabilityRegistry::global().is_headless() {
            return Err(RuntimeError::unsupported(format!(
                "selecting compiler `{kind}` in a headless build"
            )));
        }
        self.compiler = Some(kind);
        Ok(self)
    }

    /// Take ownership of `features`.
    pub fn set_features(&mut self, features: FeatureSet) -> &mut Self {
        self.features = Some(features);
        self
    }

    /// Take ownership of `target`.
    pub fn set_target(&mut self, target: TargetDescriptor) -> &mut Self {
        self.target = Some(target);
        self
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    pub fn compiler(&self) -> Option<CompilerKind> {
        self.compiler
    }

    pub fn features(&self) -> Option<&FeatureSet> {
        self.features.as_ref()
    }

    pub fn target(&self) -> Option<&TargetDescriptor> {
        self.target.as_ref()
    }

    /// Build a configuration from its serializable form.
    ///
    /// Unlike the individual setters, unknown CPU feature names and
    /// unsupported toggles are errors here, since nobody is left to inspect a
    /// `false` return.
    pub fn from_settings(settings: &EngineSettings) -> Result<Self, RuntimeError> {
        let mut config = Self::new();
        config.set_engine(settings.engine);
        if let Some(compiler) = settings.compiler {
            config.set_compiler(compiler)?;
        }

        if settings.has_feature_overrides() {
            let mut features = FeatureSet::new();
            for (toggles, enable) in [(&settings.features, true), (&settings.disabled_features, false)] {
                for toggle in toggles {
                    if !features.set(*toggle, enable) {
                        return Err(RuntimeError::unsupported(format!("feature `{toggle}`")));
                    }
                }
            }
            config.set_features(features);
        }

        if settings.target.is_some() || !settings.cpu_features.is_empty() {
            let triple = match &settings.target {
                Some(text) => text.parse::<Triple>()?,
                None => Triple::host(),
            };
            let mut cpu_features = CpuFeatureSet::new();
            for name in &settings.cpu_features {
                if !cpu_features.add(name) {
                    return Err(RuntimeError::invalid_config(format!(
                        "unknown CPU feature `{name}`"
                    )));
                }
            }
            config.set_target(TargetDescriptor::new(triple, cpu_features));
        }

        Ok(config)
    }
}

/// A realized engine.
///
/// Wraps a Wasmtime [`Engine`] together with the choices it was realized
/// from. Cloning is cheap and clones share the same compiled code cache.
#[derive(Clone)]
pub struct WasmEngine {
    engine: Engine,
    kind: EngineKind,
    compiler: Option<CompilerKind>,
    target: TargetDescriptor,
}

impl WasmEngine {
    /// Realize `config` against this build's capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The engine kind or compiler is not part of this build
    /// - A JIT engine is asked to target another machine
    /// - A CPU feature does not belong to the target architecture
    /// - Wasmtime rejects the resulting configuration
    pub fn new(config: EngineConfig) -> Result<Self, RuntimeError> {
        Self::with_registry(config, CapabilityRegistry::global())
    }

    /// Realize `config` against an explicit capability registry.
    #[instrument(skip_all, fields(engine = %config.engine))]
    pub fn with_registry(
        config: EngineConfig,
        registry: &CapabilityRegistry,
    ) -> Result<Self, RuntimeError> {
        let EngineConfig {
            engine: kind,
            compiler,
            features,
            target,
        } = config;

        if !registry.is_engine_available(kind) {
            let reason = if registry.is_headless() {
                format!("engine `{kind}` (this build has no compiler)")
            } else {
                format!("engine `{kind}`")
            };
            return Err(RuntimeError::unsupported(reason));
        }

        let compiler = match compiler {
            Some(compiler) if !registry.is_compiler_available(compiler) => {
                return Err(RuntimeError::unsupported(format!("compiler `{compiler}`")));
            }
            Some(compiler) => Some(compiler),
            None => registry.default_compiler(),
        };

        if let Some(target) = &target {
            target.validate()?;
            if kind == EngineKind::Jit && !target.is_host() {
                return Err(RuntimeError::invalid_config(format!(
                    "engine `jit` runs code in-process and cannot target `{}`",
                    target.triple()
                )));
            }
        }

        let mut wasmtime_config = Config::new();
        if let Some(features) = &features {
            features.apply(&mut wasmtime_config);
            debug!(enabled = ?features.enabled().collect::<Vec<_>>(), "Feature toggles applied");
        }
        codegen::apply(&mut wasmtime_config, compiler, target.as_ref())?;

        let engine = Engine::new(&wasmtime_config).map_err(|e| {
            RuntimeError::invalid_config(format!("Failed to create Wasmtime engine: {e:#}"))
        })?;

        let target = target.unwrap_or_else(TargetDescriptor::host);
        info!(
            compiler = compiler.map(CompilerKind::as_str),
            target = %target.triple(),
            "Wasmtime engine initialized"
        );

        Ok(Self {
            engine,
            kind,
            compiler,
            target,
        })
    }

    /// Get a reference to the inner Wasmtime engine.
    pub fn inner(&self) -> &Engine {
        &self.engine
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// The compiler in use, `None` for engines that only load artifacts.
    pub fn compiler(&self) -> Option<CompilerKind> {
        self.compiler
    }

    pub fn target(&self) -> &TargetDescriptor {
        &self.target
    }

    /// Whether modules compiled by this engine can be instantiated in this
    /// process.
    pub fn can_instantiate(&self) -> bool {
        match self.kind {
            EngineKind::Jit => true,
            EngineKind::Native => self.target.is_host(),
            EngineKind::ObjectFile => false,
        }
    }

    /// Whether this engine can translate WebAssembly itself.
    pub fn can_compile(&self) -> bool {
        self.compiler.is_some()
    }

    /// Compile `bytes` into an ahead-of-time artifact for the target.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine has no compiler or compilation fails.
    #[instrument(skip(self, bytes), fields(bytes_len = bytes.len(), target = %self.target.triple()))]
    pub fn precompile(&self, bytes: &[u8]) -> Result<Vec<u8>, RuntimeError> {
        if !self.can_compile() {
            return Err(RuntimeError::unsupported(
                "precompiling without a compiler backend",
            ));
        }
        let artifact = codegen::precompile(&self.engine, bytes)?;
        info!(artifact_len = artifact.len(), "Module precompiled");
        Ok(artifact)
    }
}

impl std::fmt::Debug for WasmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmEngine")
            .field("kind", &self.kind)
            .field("compiler", &self.compiler)
            .field("target", &self.target.triple().to_string())
            .finish_non_exhaustive()
    }
}

/// Code generator settings. Wasmtime only exposes them when a compiler is
/// linked in.
#[cfg(any(feature = "cranelift", feature = "winch"))]
mod codegen {
    use wasmtime::{Config, Engine, Strategy};

    use wasmbed_common::{CompilerKind, RuntimeError};

    use crate::target::TargetDescriptor;

    pub(super) fn apply(
        config: &mut Config,
        compiler: Option<CompilerKind>,
        target: Option<&TargetDescriptor>,
    ) -> Result<(), RuntimeError> {
        match compiler {
            Some(CompilerKind::Cranelift) => {
                config.strategy(Strategy::Cranelift);
            }
            Some(CompilerKind::Singlepass) => {
                config.strategy(Strategy::Winch);
            }
            Some(CompilerKind::Llvm) => {
                return Err(RuntimeError::unsupported("compiler `llvm`"));
            }
            None => {}
        }

        let Some(target) = target else {
            return Ok(());
        };
        if !target.is_host() {
            config
                .target(&target.triple().to_string())
                .map_err(|e| RuntimeError::invalid_config(format!("{e:#}")))?;
        }
        for feature in target.cpu_features().iter() {
            if let Some(flag) = feature.codegen_flag() {
                // SAFETY: the flag only describes the target machine. Wasmtime
                // checks it against the host before running any code compiled
                // with it.
                #[allow(unsafe_code)]
                unsafe {
                    config.cranelift_flag_enable(flag);
                }
            }
        }
        Ok(())
    }

    pub(super) fn precompile(engine: &Engine, bytes: &[u8]) -> Result<Vec<u8>, RuntimeError> {
        engine
            .precompile_module(bytes)
            .map_err(|e| RuntimeError::compilation_failed(format!("{e:#}")))
    }
}

#[cfg(not(any(feature = "cranelift", feature = "winch")))]
mod codegen {
    use wasmtime::{Config, Engine};

    use wasmbed_common::{CompilerKind, RuntimeError};

    use crate::target::TargetDescriptor;

    pub(super) fn apply(
        _config: &mut Config,
        _compiler: Option<CompilerKind>,
        target: Option<&TargetDescriptor>,
    ) -> Result<(), RuntimeError> {
        match target {
            Some(target) if !target.is_host() || !target.cpu_features().is_empty() => Err(
                RuntimeError::unsupported("target selection without a compiler backend"),
            ),
            _ => Ok(()),
        }
    }

    pub(super) fn precompile(_engine: &Engine, _bytes: &[u8]) -> Result<Vec<u8>, RuntimeError> {
        Err(RuntimeError::unsupported(
            "precompiling without a compiler backend",
        ))
    }
}
