use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::info;

use wasmbed_common::{ConfigFile, EngineKind};

use super::{EngineArgs, build_engine};

/// Precompile a module into an ahead-of-time artifact.
#[derive(Args, Debug)]
pub struct CompileCommand {
    /// Module to compile (`.wasm` or `.wat`)
    module: PathBuf,

    /// Output path. Defaults to the module with a `.cwasm` extension.
    #[arg(long, short)]
    output: Option<PathBuf>,

    #[command(flatten)]
    engine: EngineArgs,
}

impl CompileCommand {
    pub fn execute(self, file: ConfigFile) -> anyhow::Result<()> {
        let mut settings = file.runtime.engine;
        self.engine.apply(&mut settings);
        // A JIT engine has nothing to write out.
        if !self.engine.engine_given() && settings.engine == EngineKind::Jit {
            settings.engine = EngineKind::ObjectFile;
        }
        let engine = build_engine(settings, true)?;

        let source = std::fs::read(&self.module)
            .with_context(|| format!("Failed to read {}", self.module.display()))?;
        let binary = wasmbed_core::wat2wasm(&source)
            .with_context(|| format!("Failed to convert {}", self.module.display()))?;
        let artifact = engine
            .precompile(&binary)
            .with_context(|| format!("Failed to compile {}", self.module.display()))?;

        let output = self
            .output
            .unwrap_or_else(|| self.module.with_extension("cwasm"));
        std::fs::write(&output, &artifact)
            .with_context(|| format!("Failed to write {}", output.display()))?;

        info!(
            output = %output.display(),
            target = %engine.target().triple(),
            bytes = artifact.len(),
            "Artifact written"
        );
        Ok(())
    }
}
