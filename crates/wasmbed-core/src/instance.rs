//! Instantiation and entry-point execution.
//!
//! 1. Resolve imports (see the `wasmbed-wasi` crate) into one slot per import
//! 2. [`instantiate`] the module in a store
//! 3. [`run_entry_point`] and classify the outcome

use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};
use wasmtime::{Extern, Func, Instance, Store, Trap};
use wasmtime_wasi::I32Exit;

use crate::CompiledModule;
use crate::store::HostState;
use wasmbed_common::RuntimeError;

/// Result of executing an entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Execution returned normally.
    Success,

    /// The guest called WASI `proc_exit`.
    Exit {
        /// Exit status passed by the guest.
        code: i32,
    },

    /// Execution completed with a trap (runtime error).
    Trap {
        /// Description of the trap.
        message: String,
        /// Trap code if available.
        code: Option<String>,
    },
}

impl ExecutionResult {
    /// Returns `true` for a normal return or `proc_exit(0)`.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ExecutionResult::Success | ExecutionResult::Exit { code: 0 }
        )
    }

    /// Returns `true` if execution trapped.
    pub fn is_trap(&self) -> bool {
        matches!(self, ExecutionResult::Trap { .. })
    }

    /// Process exit status equivalent to this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecutionResult::Success => 0,
            ExecutionResult::Exit { code } => *code,
            ExecutionResult::Trap { .. } => 128 + 6,
        }
    }
}

/// Instantiate `module` with one resolved host object per import.
///
/// # Errors
///
/// Returns an error if `imports` has the wrong length, if a slot is still
/// unresolved, or if Wasmtime rejects the instantiation (e.g. a type
/// mismatch or a trapping start section).
#[instrument(skip_all, fields(module = %module.content_hash(), imports = imports.len()))]
pub fn instantiate(
    store: &mut Store<HostState>,
    module: &CompiledModule,
    imports: &[Option<Extern>],
) -> Result<Instance, RuntimeError> {
    let declared = module.imports();
    if declared.len() != imports.len() {
        return Err(RuntimeError::instantiation_failed(format!(
            "module declares {} imports, {} provided",
            declared.len(),
            imports.len()
        )));
    }

    let mut resolved = Vec::with_capacity(imports.len());
    for (index, (slot, import)) in imports.iter().zip(&declared).enumerate() {
        match slot {
            Some(ext) => resolved.push(ext.clone()),
            None => {
                return Err(RuntimeError::instantiation_failed(format!(
                    "import #{index} \"{}\" \"{}\" is unresolved",
                    import.module, import.name
                )));
            }
        }
    }

    let instance = Instance::new(&mut *store, module.inner(), &resolved)
        .map_err(|e| RuntimeError::instantiation_failed(format!("{e:#}")))?;
    debug!("Module instantiated");
    Ok(instance)
}

/// Execute the `() -> ()` export `entry_point`.
///
/// Traps and WASI exits are outcomes, not errors.
///
/// # Errors
///
/// Returns an error if the export is missing or has another signature.
#[instrument(skip(store, instance), fields(entry_point = %entry_point))]
pub fn run_entry_point(
    store: &mut Store<HostState>,
    instance: &Instance,
    entry_point: &str,
) -> Result<ExecutionResult, RuntimeError> {
    let func = instance
        .get_func(&mut *store, entry_point)
        .ok_or_else(|| RuntimeError::ExportNotFound {
            name: entry_point.to_string(),
        })?;
    call_entry_point(store, &func)
}

/// Call `func`, which must take no parameters and return nothing.
///
/// # Errors
///
/// Returns an error if `func` has another signature.
pub fn call_entry_point(
    store: &mut Store<HostState>,
    func: &Func,
) -> Result<ExecutionResult, RuntimeError> {
    let start = Instant::now();
    let func = func.typed::<(), ()>(&*store).map_err(|e| {
        RuntimeError::instantiation_failed(format!("entry point has the wrong signature: {e:#}"))
    })?;

    debug!("Executing entry point");
    let result = func.call(&mut *store, ());
    let duration = start.elapsed();

    match result {
        Ok(()) => {
            info!(
                duration_ms = duration.as_millis(),
                "Execution completed successfully"
            );
            Ok(ExecutionResult::Success)
        }
        Err(err) => {
            if let Some(exit) = err.downcast_ref::<I32Exit>() {
                info!(
                    duration_ms = duration.as_millis(),
                    code = exit.0,
                    "Guest exited"
                );
                return Ok(ExecutionResult::Exit { code: exit.0 });
            }

            let (message, code) = extract_trap_info(&err);
            if code.is_none() {
                warn!(error = %message, "Entry point failed without a trap code");
            }
            error!(
                duration_ms = duration.as_millis(),
                trap_message = %message,
                "Execution trapped"
            );
            Ok(ExecutionResult::Trap { message, code })
        }
    }
}

/// Extract human-readable trap information.
fn extract_trap_info(error: &wasmtime::Error) -> (String, Option<String>) {
    let message = format!("{error:#}");

    // Try to get the trap code
    let code = error.downcast_ref::<Trap>().map(|trap| format!("{trap:?}"));

    (message, code)
}
