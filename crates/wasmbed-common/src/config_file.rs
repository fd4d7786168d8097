//! Configuration file structures for wasmbed.
//!
//! This module defines structures for TOML configuration files:
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`RunSection`]: What the `run` command executes

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::RuntimeConfig;

/// Top-level configuration file structure.
///
/// # Example
///
/// ```toml
/// [runtime.engine]
/// engine = "jit"
/// compiler = "cranelift"
/// features = ["simd", "bulk-memory"]
///
/// [runtime.wasi]
/// program_name = "hello"
/// args = ["--verbose"]
/// preopen_dirs = ["./data"]
/// stdout = "capture"
///
/// [runtime.wasi.env]
/// RUST_BACKTRACE = "1"
///
/// [[runtime.wasi.map_dirs]]
/// alias = "/tmp"
/// host_path = "./scratch"
///
/// [run]
/// module = "./hello.wasm"
/// entry_point = "_start"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Engine and WASI configuration.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Module to run.
    #[serde(default)]
    pub run: RunSection,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }
}

/// The `[run]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunSection {
    /// Path to the module (binary or text format).
    #[serde(default)]
    pub module: Option<String>,

    /// Export invoked after instantiation.
    #[serde(default = "defaults::entry_point")]
    pub entry_point: String,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            module: None,
            entry_point: defaults::entry_point(),
        }
    }
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}

mod defaults {
    pub fn entry_point() -> String {
        "_start".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompilerKind, EngineKind, FeatureToggle, OutputPolicy};

    #[test]
    fn test_default_config_file() {
        let config = ConfigFile::default();

        assert!(config.run.module.is_none());
        assert_eq!(config.run.entry_point, "_start");
        assert_eq!(config.runtime.engine.engine, EngineKind::Jit);
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [run]
            module = "./app.wasm"
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();

        assert_eq!(config.run.module.as_deref(), Some("./app.wasm"));
        // Defaults applied
        assert_eq!(config.run.entry_point, "_start");
        assert_eq!(config.runtime.wasi.program_name, "main");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [runtime.engine]
            engine = "native"
            compiler = "cranelift"
            features = ["simd", "bulk-memory"]
            disabled_features = ["threads"]
            target = "x86_64-unknown-linux-gnu"
            cpu_features = ["sse4.2", "avx2"]

            [runtime.wasi]
            program_name = "prog"
            args = ["--flag"]
            preopen_dirs = ["./data"]
            inherit_stdin = false
            stdout = "capture"
            stderr = "ignore"
            capture_capacity = 4096

            [runtime.wasi.env]
            A = "1"

            [[runtime.wasi.map_dirs]]
            alias = "/tmp"
            host_path = "./scratch"

            [run]
            module = "./prog.wasm"
            entry_point = "main"
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();
        let engine = &config.runtime.engine;
        let wasi = &config.runtime.wasi;

        assert_eq!(engine.engine, EngineKind::Native);
        assert_eq!(engine.compiler, Some(CompilerKind::Cranelift));
        assert_eq!(
            engine.features,
            vec![FeatureToggle::Simd, FeatureToggle::BulkMemory]
        );
        assert_eq!(engine.disabled_features, vec![FeatureToggle::Threads]);
        assert_eq!(engine.target.as_deref(), Some("x86_64-unknown-linux-gnu"));
        assert_eq!(engine.cpu_features, vec!["sse4.2", "avx2"]);

        assert_eq!(wasi.program_name, "prog");
        assert_eq!(wasi.args, vec!["--flag"]);
        assert_eq!(wasi.env.get("A").map(String::as_str), Some("1"));
        assert_eq!(wasi.preopen_dirs, vec!["./data"]);
        assert_eq!(wasi.map_dirs[0].alias, "/tmp");
        assert!(!wasi.inherit_stdin);
        assert_eq!(wasi.stdout, OutputPolicy::Capture);
        assert_eq!(wasi.stderr, OutputPolicy::Ignore);
        assert_eq!(wasi.capture_capacity, 4096);

        assert_eq!(config.run.entry_point, "main");
    }

    #[test]
    fn test_parse_unknown_engine() {
        let toml = r#"
            [runtime.engine]
            engine = "dylib"
        "#;
        assert!(ConfigFile::from_toml(toml).is_err());
    }

    #[test]
    fn test_parse_invalid_toml() {
        let invalid = "this is not valid toml [";
        let result = ConfigFile::from_toml(invalid);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigFile::from_file("/nonexistent/wasmbed.toml").unwrap_err();
        assert!(matches!(err, ConfigFileError::Io { .. }));
    }
}
