use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Args;
use tracing::{info, warn};

use wasmbed_common::{ConfigFile, MappedDir, OutputPolicy, RuntimeError, WasiError, WasiSettings};
use wasmbed_core::{ExecutionResult, create_store, instantiate, run_entry_point};
use wasmbed_wasi::{WasiEnvironment, WasiHostConfig, WasiVersion, resolve_imports_ordered};

use super::{EngineArgs, build_engine, load_module};

/// Instantiate a module with WASI imports and call its entry point.
#[derive(Args, Debug)]
pub struct RunCommand {
    /// Module to run: `.wasm`, `.wat`, or a precompiled `.cwasm`.
    /// Defaults to `run.module` from the configuration file.
    module: Option<PathBuf>,

    /// Arguments passed to the guest after the program name
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Export to call instead of `_start`
    #[arg(long, value_name = "NAME")]
    invoke: Option<String>,

    /// Environment variable for the guest (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_var)]
    env: Vec<(String, String)>,

    /// Expose a host directory under its own path (repeatable)
    #[arg(long = "dir", value_name = "DIR")]
    dirs: Vec<String>,

    /// Expose a host directory under another path (repeatable)
    #[arg(long = "mapdir", value_name = "GUEST::HOST", value_parser = parse_map_dir)]
    map_dirs: Vec<MappedDir>,

    /// Guest stdout: `inherit`, `capture` or `ignore`
    #[arg(long, value_name = "POLICY")]
    stdout: Option<OutputPolicy>,

    /// Guest stderr: `inherit`, `capture` or `ignore`
    #[arg(long, value_name = "POLICY")]
    stderr: Option<OutputPolicy>,

    /// Give the guest an empty stdin
    #[arg(long)]
    no_stdin: bool,

    /// Resolve imports for this WASI version instead of detecting it
    #[arg(long, value_name = "VERSION", value_parser = parse_wasi_version)]
    wasi_version: Option<WasiVersion>,

    #[command(flatten)]
    engine: EngineArgs,
}

impl RunCommand {
    /// Run the module and return the process exit status.
    pub fn execute(self, file: ConfigFile) -> anyhow::Result<i32> {
        let ConfigFile { mut runtime, run } = file;

        let module_path = self
            .module
            .clone()
            .or_else(|| run.module.map(PathBuf::from))
            .context("No module given on the command line or in the [run] section")?;
        let entry_point = self.invoke.clone().unwrap_or(run.entry_point);

        self.engine.apply(&mut runtime.engine);
        self.apply_wasi(&mut runtime.wasi, &module_path);

        let engine = build_engine(runtime.engine, self.engine.engine_given())?;
        let module = load_module(&engine, &module_path)?;

        let mut config =
            WasiHostConfig::from_settings(&runtime.wasi).context("Invalid WASI configuration")?;
        if let Some(version) = self.wasi_version {
            config.version(version);
        }
        let mut environment =
            WasiEnvironment::new(config).context("Failed to set up the WASI environment")?;

        let mut store = create_store(&engine);
        let imports = resolve_imports_ordered(&mut store, &module, &environment)
            .context("Failed to resolve WASI imports")?;
        let instance = instantiate(&mut store, &module, &imports)?;
        let outcome = run_entry_point(&mut store, &instance, &entry_point)?;

        forward_captured(&mut environment, &runtime.wasi)?;

        match outcome {
            ExecutionResult::Success => {
                info!(entry_point = %entry_point, "Module finished");
                Ok(0)
            }
            ExecutionResult::Exit { code } => {
                info!(code, "Module exited");
                Ok(code)
            }
            ExecutionResult::Trap { message, .. } => bail!("Module trapped: {message}"),
        }
    }

    /// Layer the WASI flags over `settings`.
    fn apply_wasi(&self, settings: &mut WasiSettings, module_path: &std::path::Path) {
        if settings.program_name == WasiSettings::default().program_name {
            if let Some(name) = module_path.file_name().and_then(|n| n.to_str()) {
                settings.program_name = name.to_string();
            }
        }
        if !self.args.is_empty() {
            settings.args.clone_from(&self.args);
        }
        for (key, value) in &self.env {
            settings.env.insert(key.clone(), value.clone());
        }
        settings.preopen_dirs.extend(self.dirs.iter().cloned());
        settings.map_dirs.extend(self.map_dirs.iter().cloned());
        if let Some(policy) = self.stdout {
            settings.stdout = policy;
        }
        if let Some(policy) = self.stderr {
            settings.stderr = policy;
        }
        if self.no_stdin {
            settings.inherit_stdin = false;
        }
    }
}

/// Print whatever the guest wrote to captured streams.
fn forward_captured(environment: &mut WasiEnvironment, settings: &WasiSettings) -> anyhow::Result<()> {
    if settings.stdout == OutputPolicy::Capture {
        forward(|| environment.take_stdout(), &mut std::io::stdout())
            .context("Failed to forward guest stdout")?;
    }
    if settings.stderr == OutputPolicy::Capture {
        forward(|| environment.take_stderr(), &mut std::io::stderr())
            .context("Failed to forward guest stderr")?;
    }
    Ok(())
}

/// Drain `take` into `out` until it comes back empty, so a dropped write is
/// reported rather than ignored.
fn forward(
    mut take: impl FnMut() -> Result<Vec<u8>, WasiError>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    loop {
        let bytes = take().map_err(RuntimeError::from)?;
        if bytes.is_empty() {
            return Ok(());
        }
        out.write_all(&bytes)?;
    }
}

fn parse_env_var(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    if key.is_empty() {
        return Err(format!("empty variable name in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_map_dir(s: &str) -> Result<MappedDir, String> {
    let (alias, host_path) = s
        .split_once("::")
        .ok_or_else(|| format!("expected GUEST::HOST, got `{s}`"))?;
    Ok(MappedDir {
        alias: alias.to_string(),
        host_path: host_path.to_string(),
    })
}

fn parse_wasi_version(s: &str) -> Result<WasiVersion, String> {
    match s {
        "latest" => Ok(WasiVersion::Latest),
        "snapshot0" => Ok(WasiVersion::Snapshot0),
        "snapshot1" => Ok(WasiVersion::Snapshot1),
        other => WasiVersion::from_namespace(other).ok_or_else(|| {
            warn!(version = other, "unknown WASI version");
            format!("unknown WASI version `{other}`")
        }),
    }
}
