//! wasmbed CLI entry point.
//!
//! Runs, precompiles and inspects WebAssembly modules through the same
//! engine configuration and WASI import resolution the C API exposes.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wasmbed_common::{ConfigFile, RuntimeError};

mod commands;

/// Exit status when the host ran out of a resource, as `EX_OSERR` in
/// `sysexits.h`.
const EXIT_RESOURCE_EXHAUSTED: i32 = 71;

/// Host-embedding runtime for WebAssembly modules.
#[derive(Parser)]
#[command(name = "wasmbed", version)]
struct Cli {
    /// TOML configuration file. Command-line flags take precedence.
    #[arg(long, short, global = true, env = "WASMBED_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Instantiate a module with WASI imports and call its entry point
    Run(commands::RunCommand),

    /// Precompile a module into an ahead-of-time artifact
    Compile(commands::CompileCommand),

    /// Print a module's imports, exports and detected WASI version
    Inspect(commands::InspectCommand),

    /// Convert WebAssembly text to binary
    Wat2wasm(commands::Wat2WasmCommand),

    /// List the engines and compilers linked into this build
    Capabilities,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wasmbed=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConfigFile::default(),
    };

    match cli.command {
        Command::Run(cmd) => match cmd.execute(file) {
            Ok(0) => Ok(()),
            Ok(code) => std::process::exit(code),
            Err(err) if is_fatal(&err) => {
                tracing::error!(error = %format!("{err:#}"), "Host resources exhausted");
                std::process::exit(EXIT_RESOURCE_EXHAUSTED);
            }
            Err(err) => Err(err),
        },
        Command::Compile(cmd) => cmd.execute(file),
        Command::Inspect(cmd) => cmd.execute(file),
        Command::Wat2wasm(cmd) => cmd.execute(),
        Command::Capabilities => {
            commands::print_capabilities();
            Ok(())
        }
    }
}

/// Whether `err` was caused by a fatal runtime error anywhere in its chain.
fn is_fatal(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<RuntimeError>())
        .any(RuntimeError::is_fatal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmbed_common::WasiError;

    #[test]
    fn test_is_fatal_looks_through_context() {
        let overflow = WasiError::CaptureOverflow {
            stream: "stderr",
            capacity: 8,
        };
        let err = Err::<(), _>(RuntimeError::from(overflow))
            .context("Failed to forward guest stderr")
            .unwrap_err();
        assert!(is_fatal(&err));

        let err = anyhow::Error::from(RuntimeError::invalid_config("bad"));
        assert!(!is_fatal(&err));
        assert!(!is_fatal(&anyhow::anyhow!("plain")));
    }
}
