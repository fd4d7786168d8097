use std::path::PathBuf;

use clap::Args;

use wasmbed_common::ConfigFile;
use wasmbed_wasi::detect_wasi_version;

use super::{EngineArgs, build_engine, load_module};

/// Print a module's imports, exports and detected WASI version.
#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Module to inspect: `.wasm`, `.wat`, or a precompiled `.cwasm`
    module: PathBuf,

    #[command(flatten)]
    engine: EngineArgs,
}

impl InspectCommand {
    pub fn execute(self, file: ConfigFile) -> anyhow::Result<()> {
        let mut settings = file.runtime.engine;
        self.engine.apply(&mut settings);
        let engine = build_engine(settings, self.engine.engine_given())?;
        let module = load_module(&engine, &self.module)?;

        let imports = module.imports();
        let exports = module.exports();

        println!("module:       {}", self.module.display());
        println!("name:         {}", module.name().unwrap_or("-"));
        println!("hash:         {}", module.content_hash());
        println!("wasi version: {}", detect_wasi_version(&imports));

        println!("imports ({}):", imports.len());
        for (index, import) in imports.iter().enumerate() {
            println!(
                "  #{index:<3} {:<7} {}.{}",
                import.kind, import.module, import.name
            );
        }
        println!("exports ({}):", exports.len());
        for export in &exports {
            println!("  {:<7} {}", export.kind, export.name);
        }
        Ok(())
    }
}
