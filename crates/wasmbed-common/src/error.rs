//! Error types for wasmbed.
//!
//! This module defines a hierarchy of error types using `thiserror`:
//! - [`RuntimeError`]: Top-level errors for engine configuration, compilation
//!   and instantiation
//! - [`WasiError`]: Errors from building WASI environments and resolving
//!   WASI imports

use std::io;

use thiserror::Error;

/// Top-level runtime errors.
///
/// These errors represent failures that can occur from the moment an engine
/// configuration is realized up to the execution of an entry point.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// The requested capability is not part of this build.
    #[error("Unsupported in this build: {what}")]
    Unsupported {
        /// The engine kind, compiler or operation that is missing.
        what: String,
    },

    /// A target triple could not be parsed.
    #[error("Invalid target triple `{input}`: {reason}")]
    InvalidTriple {
        /// The text that was rejected.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// WebAssembly compilation failed.
    #[error("Compilation failed: {reason}")]
    CompilationFailed {
        /// Description of the compilation failure.
        reason: String,
    },

    /// Text-format source could not be converted to binary.
    #[error("Failed to convert text format to binary: {reason}")]
    TextFormat {
        /// Parser diagnostic.
        reason: String,
    },

    /// Instantiation of a module failed.
    #[error("Instantiation failed: {reason}")]
    InstantiationFailed {
        /// Description of the instantiation failure.
        reason: String,
    },

    /// The requested export was not found on an instance.
    #[error("Export not found: {name}")]
    ExportNotFound {
        /// The export name that was looked up.
        name: String,
    },

    /// A host resource (memory, buffer space) could not be obtained.
    #[error("Resource exhausted: {reason}")]
    ResourceExhausted {
        /// Description of the exhausted resource.
        reason: String,
    },

    /// WASI operation failed.
    #[error("WASI error: {0}")]
    Wasi(#[source] WasiError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// WASI-related errors.
///
/// These errors occur while realizing a WASI environment or while matching a
/// module's WASI imports against it.
#[derive(Error, Debug)]
pub enum WasiError {
    /// Failed to initialize the WASI context.
    #[error("WASI initialization failed: {reason}")]
    InitializationFailed {
        /// Description of the initialization failure.
        reason: String,
    },

    /// A directory exposure request could not be honored.
    #[error("Cannot expose directory `{path}`: {reason}")]
    PreopenFailed {
        /// Host path of the directory.
        path: String,
        /// Why it could not be exposed.
        reason: String,
    },

    /// A stream was read back but was not configured for capture.
    #[error("{stream} is not configured for capture")]
    NotCaptured {
        /// The stream name (`stdout` or `stderr`).
        stream: &'static str,
    },

    /// A recognized WASI import could not be produced.
    #[error("Failed to resolve import #{index} \"{module}\" \"{name}\": {reason}")]
    ImportUnavailable {
        /// Position of the import in the module's import list.
        index: usize,
        /// Import namespace.
        module: String,
        /// Import name.
        name: String,
        /// Why the import could not be produced.
        reason: String,
    },

    /// Guest output outgrew the bytes a capture buffer may hold unread.
    #[error("{stream} capture overflowed its {capacity}-byte buffer")]
    CaptureOverflow {
        /// The stream name (`stdout` or `stderr`).
        stream: &'static str,
        /// Bytes the buffer holds before it must be drained.
        capacity: usize,
    },
}

impl From<WasiError> for RuntimeError {
    fn from(err: WasiError) -> Self {
        if err.is_fatal() {
            Self::ResourceExhausted {
                reason: err.to_string(),
            }
        } else {
            Self::Wasi(err)
        }
    }
}

impl RuntimeError {
    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a new `Unsupported` error.
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported { what: what.into() }
    }

    /// Create a new `InvalidTriple` error.
    pub fn invalid_triple(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTriple {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a new `CompilationFailed` error.
    pub fn compilation_failed(reason: impl Into<String>) -> Self {
        Self::CompilationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `InstantiationFailed` error.
    pub fn instantiation_failed(reason: impl Into<String>) -> Self {
        Self::InstantiationFailed {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error is fatal for the process rather than for
    /// the single call that produced it.
    ///
    /// Fatal errors come from exhausted host resources; retrying with
    /// different inputs will not help.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::ResourceExhausted { .. } => true,
            Self::Io(err) => err.kind() == io::ErrorKind::OutOfMemory,
            _ => false,
        }
    }

    /// Returns `true` if the error stems from a capability missing in this
    /// build.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

impl WasiError {
    /// Create a new `InitializationFailed` error.
    pub fn initialization_failed(reason: impl Into<String>) -> Self {
        Self::InitializationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `PreopenFailed` error.
    pub fn preopen_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PreopenFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if a host buffer ran out of room.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CaptureOverflow { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RuntimeError::unsupported("compiler `llvm`");
        assert_eq!(err.to_string(), "Unsupported in this build: compiler `llvm`");

        let err = RuntimeError::invalid_triple("x86_64", "expected 3 or 4 components");
        assert_eq!(
            err.to_string(),
            "Invalid target triple `x86_64`: expected 3 or 4 components"
        );
    }

    #[test]
    fn test_error_from_wasi() {
        let wasi_err = WasiError::NotCaptured { stream: "stdout" };
        let runtime_err: RuntimeError = wasi_err.into();

        assert!(matches!(runtime_err, RuntimeError::Wasi(_)));
        assert_eq!(
            runtime_err.to_string(),
            "WASI error: stdout is not configured for capture"
        );
    }

    #[test]
    fn test_import_unavailable_names_import() {
        let err = WasiError::ImportUnavailable {
            index: 3,
            module: "wasi_snapshot_preview1".into(),
            name: "fd_write".into(),
            reason: "kind mismatch".into(),
        };
        let message = err.to_string();
        assert!(message.contains("#3"));
        assert!(message.contains("fd_write"));
    }

    #[test]
    fn test_is_fatal() {
        assert!(
            RuntimeError::ResourceExhausted {
                reason: "capture buffer".into()
            }
            .is_fatal()
        );
        assert!(RuntimeError::Io(io::Error::from(io::ErrorKind::OutOfMemory)).is_fatal());
        assert!(!RuntimeError::Io(io::Error::from(io::ErrorKind::NotFound)).is_fatal());
        assert!(!RuntimeError::invalid_config("bad").is_fatal());
    }

    #[test]
    fn test_capture_overflow_is_resource_exhausted() {
        let wasi_err = WasiError::CaptureOverflow {
            stream: "stdout",
            capacity: 12,
        };
        assert!(wasi_err.is_fatal());
        assert!(!WasiError::NotCaptured { stream: "stdout" }.is_fatal());

        let runtime_err = RuntimeError::from(wasi_err);
        assert!(matches!(runtime_err, RuntimeError::ResourceExhausted { .. }));
        assert!(runtime_err.is_fatal());
        assert_eq!(
            runtime_err.to_string(),
            "Resource exhausted: stdout capture overflowed its 12-byte buffer"
        );
    }

    #[test]
    fn test_is_unsupported() {
        assert!(RuntimeError::unsupported("jit").is_unsupported());
        assert!(!RuntimeError::compilation_failed("oops").is_unsupported());
    }
}
