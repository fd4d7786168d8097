//! Configuration structures for wasmbed.
//!
//! This module defines the serializable configuration model:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`EngineSettings`]: Engine kind, compiler, proposals and target
//! - [`WasiSettings`]: Guest arguments, environment, directories and stdio
//!
//! These are plain data. The builders in `wasmbed-core` and `wasmbed-wasi`
//! turn them into validated values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::kinds::{CompilerKind, EngineKind, FeatureToggle, OutputPolicy};

/// Top-level runtime configuration.
///
/// It can be loaded from TOML or JSON files; every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Engine configuration.
    #[serde(default)]
    pub engine: EngineSettings,

    /// WASI host configuration.
    #[serde(default)]
    pub wasi: WasiSettings,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineSettings {
    /// Engine kind used to realize the configuration.
    #[serde(default = "defaults::engine")]
    pub engine: EngineKind,

    /// Compiler backend. `None` picks the first compiler available.
    #[serde(default)]
    pub compiler: Option<CompilerKind>,

    /// Proposals to enable explicitly.
    ///
    /// When both this and `disabled_features` are empty, the engine keeps
    /// its own defaults.
    #[serde(default)]
    pub features: Vec<FeatureToggle>,

    /// Proposals to disable explicitly.
    #[serde(default)]
    pub disabled_features: Vec<FeatureToggle>,

    /// Target triple for ahead-of-time compilation. `None` means the host.
    #[serde(default)]
    pub target: Option<String>,

    /// CPU features assumed to be present on the target.
    #[serde(default)]
    pub cpu_features: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            engine: defaults::engine(),
            compiler: None,
            features: Vec::new(),
            disabled_features: Vec::new(),
            target: None,
            cpu_features: Vec::new(),
        }
    }
}

impl EngineSettings {
    /// Whether any proposal is toggled explicitly.
    pub fn has_feature_overrides(&self) -> bool {
        !self.features.is_empty() || !self.disabled_features.is_empty()
    }
}

/// A directory exposed to the guest under a different name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MappedDir {
    /// Path as seen by the guest.
    pub alias: String,

    /// Directory on the host.
    pub host_path: String,
}

/// WASI host configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WasiSettings {
    /// Program name, passed to the guest as `argv[0]`.
    #[serde(default = "defaults::program_name")]
    pub program_name: String,

    /// Arguments following the program name.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Host directories exposed under their own path.
    #[serde(default)]
    pub preopen_dirs: Vec<String>,

    /// Host directories exposed under an alias.
    #[serde(default)]
    pub map_dirs: Vec<MappedDir>,

    /// Whether the guest reads the host's stdin.
    #[serde(default = "defaults::inherit_stdin")]
    pub inherit_stdin: bool,

    /// Policy for the guest's stdout.
    #[serde(default)]
    pub stdout: OutputPolicy,

    /// Policy for the guest's stderr.
    #[serde(default)]
    pub stderr: OutputPolicy,

    /// Upper bound in bytes of each capture buffer.
    #[serde(default = "defaults::capture_capacity")]
    pub capture_capacity: usize,
}

impl Default for WasiSettings {
    fn default() -> Self {
        Self {
            program_name: defaults::program_name(),
            args: Vec::new(),
            env: BTreeMap::new(),
            preopen_dirs: Vec::new(),
            map_dirs: Vec::new(),
            inherit_stdin: defaults::inherit_stdin(),
            stdout: OutputPolicy::default(),
            stderr: OutputPolicy::default(),
            capture_capacity: defaults::capture_capacity(),
        }
    }
}

/// Default value functions for serde.
pub(crate) mod defaults {
    use crate::kinds::EngineKind;

    pub const fn engine() -> EngineKind {
        EngineKind::Jit
    }

    pub fn program_name() -> String {
        "main".to_string()
    }

    pub const fn inherit_stdin() -> bool {
        true
    }

    pub const fn capture_capacity() -> usize {
        16 * 1024 * 1024
    }
}

/// Default upper bound in bytes of a capture buffer.
pub const DEFAULT_CAPTURE_CAPACITY: usize = defaults::capture_capacity();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();

        assert_eq!(config.engine.engine, EngineKind::Jit);
        assert!(config.engine.compiler.is_none());
        assert!(!config.engine.has_feature_overrides());
        assert!(config.engine.target.is_none());

        assert_eq!(config.wasi.program_name, "main");
        assert!(config.wasi.inherit_stdin);
        assert_eq!(config.wasi.stdout, OutputPolicy::Inherit);
        assert_eq!(config.wasi.capture_capacity, DEFAULT_CAPTURE_CAPACITY);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = RuntimeConfig::default();
        config.engine.features.push(FeatureToggle::Simd);
        config.wasi.env.insert("A".into(), "1".into());

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RuntimeConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_deserialization() {
        let json = r#"{"engine": {"engine": "native", "compiler": "cranelift"}}"#;
        let config: RuntimeConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.engine.engine, EngineKind::Native);
        assert_eq!(config.engine.compiler, Some(CompilerKind::Cranelift));
        // Defaults for unspecified sections
        assert_eq!(config.wasi.program_name, "main");
    }

    #[test]
    fn test_feature_overrides() {
        let settings = EngineSettings {
            disabled_features: vec![FeatureToggle::Threads],
            ..Default::default()
        };
        assert!(settings.has_feature_overrides());
    }
}
