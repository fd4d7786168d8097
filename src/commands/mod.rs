//! CLI subcommands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use tracing::info;

use wasmbed_common::{CompilerKind, EngineKind, EngineSettings, FeatureToggle};
use wasmbed_core::{CapabilityRegistry, CompiledModule, EngineConfig, WasmEngine};

mod compile;
mod inspect;
mod run;

pub use compile::CompileCommand;
pub use inspect::InspectCommand;
pub use run::RunCommand;

/// Engine flags shared by every command that realizes an engine.
#[derive(Args, Debug, Default)]
pub struct EngineArgs {
    /// Engine kind: `jit`, `native` or `object-file`
    #[arg(long, value_name = "KIND")]
    engine: Option<EngineKind>,

    /// Compiler backend: `cranelift`, `llvm` or `singlepass`
    #[arg(long, value_name = "NAME")]
    compiler: Option<CompilerKind>,

    /// Enable a proposal, e.g. `simd` (repeatable)
    #[arg(long = "enable", value_name = "FEATURE")]
    enable: Vec<FeatureToggle>,

    /// Disable a proposal (repeatable)
    #[arg(long = "disable", value_name = "FEATURE")]
    disable: Vec<FeatureToggle>,

    /// Target triple for ahead-of-time compilation
    #[arg(long, value_name = "TRIPLE")]
    target: Option<String>,

    /// CPU feature assumed on the target, e.g. `sse4.2` (repeatable)
    #[arg(long = "cpu-feature", value_name = "NAME")]
    cpu_features: Vec<String>,
}

impl EngineArgs {
    /// Layer these flags over `settings`.
    fn apply(&self, settings: &mut EngineSettings) {
        if let Some(engine) = self.engine {
            settings.engine = engine;
        }
        if let Some(compiler) = self.compiler {
            settings.compiler = Some(compiler);
        }
        for toggle in &self.enable {
            settings.disabled_features.retain(|t| t != toggle);
            if !settings.features.contains(toggle) {
                settings.features.push(*toggle);
            }
        }
        for toggle in &self.disable {
            settings.features.retain(|t| t != toggle);
            if !settings.disabled_features.contains(toggle) {
                settings.disabled_features.push(*toggle);
            }
        }
        if let Some(target) = &self.target {
            settings.target = Some(target.clone());
        }
        settings.cpu_features.extend(self.cpu_features.iter().cloned());
    }

    fn engine_given(&self) -> bool {
        self.engine.is_some()
    }
}

/// Realize `settings` into an engine.
///
/// A headless build cannot JIT, so an engine kind left at its default falls
/// back to loading native artifacts.
fn build_engine(mut settings: EngineSettings, engine_given: bool) -> anyhow::Result<WasmEngine> {
    if !engine_given
        && settings.engine == EngineKind::Jit
        && CapabilityRegistry::global().is_headless()
    {
        info!("Headless build, using the native engine");
        settings.engine = EngineKind::Native;
    }
    let config = EngineConfig::from_settings(&settings).context("Invalid engine configuration")?;
    WasmEngine::new(config).context("Failed to create engine")
}

/// Load a module from source, or from a precompiled artifact when the file
/// has a `.cwasm` extension.
fn load_module(engine: &WasmEngine, path: &Path) -> anyhow::Result<CompiledModule> {
    let precompiled = path.extension().is_some_and(|ext| ext == "cwasm");
    let module = if precompiled {
        CompiledModule::from_precompiled(engine, path)
    } else {
        CompiledModule::from_file(engine, path)
    };
    module.with_context(|| format!("Failed to load module {}", path.display()))
}

/// Convert WebAssembly text to binary.
#[derive(Args, Debug)]
pub struct Wat2WasmCommand {
    /// Text-format input
    input: PathBuf,

    /// Output path. Defaults to the input with a `.wasm` extension.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl Wat2WasmCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let source = std::fs::read(&self.input)
            .with_context(|| format!("Failed to read {}", self.input.display()))?;
        let binary = wasmbed_core::wat2wasm(&source)
            .with_context(|| format!("Failed to convert {}", self.input.display()))?;

        let output = self
            .output
            .unwrap_or_else(|| self.input.with_extension("wasm"));
        std::fs::write(&output, &binary)
            .with_context(|| format!("Failed to write {}", output.display()))?;

        info!(output = %output.display(), bytes = binary.len(), "Binary written");
        Ok(())
    }
}

pub fn print_capabilities() {
    println!("{}", CapabilityRegistry::global().summary());
}
