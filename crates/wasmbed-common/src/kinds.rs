//! Enumerations shared between configuration files, the Rust API and the C
//! boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How compiled code is produced and stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// Compile in-process and run immediately.
    Jit,
    /// Ahead-of-time artifact that can be loaded back as a shared artifact.
    Native,
    /// Ahead-of-time object file, possibly for another machine.
    ObjectFile,
}

impl EngineKind {
    /// All engine kinds, in declaration order.
    pub const ALL: [EngineKind; 3] = [Self::Jit, Self::Native, Self::ObjectFile];

    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jit => "jit",
            Self::Native => "native",
            Self::ObjectFile => "object-file",
        }
    }

    /// Whether this engine produces artifacts ahead of time.
    pub fn is_ahead_of_time(self) -> bool {
        !matches!(self, Self::Jit)
    }
}

/// Compiler backend used to translate WebAssembly to machine code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompilerKind {
    /// Optimizing Cranelift backend.
    Cranelift,
    /// LLVM backend.
    Llvm,
    /// Baseline single-pass backend.
    Singlepass,
}

impl CompilerKind {
    /// All compiler kinds, in declaration order.
    pub const ALL: [CompilerKind; 3] = [Self::Cranelift, Self::Llvm, Self::Singlepass];

    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cranelift => "cranelift",
            Self::Llvm => "llvm",
            Self::Singlepass => "singlepass",
        }
    }
}

/// Optional WebAssembly proposals that can be toggled per engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureToggle {
    BulkMemory,
    Memory64,
    ModuleLinking,
    MultiMemory,
    MultiValue,
    ReferenceTypes,
    Simd,
    TailCall,
    Threads,
}

impl FeatureToggle {
    /// All toggles, in declaration order.
    pub const ALL: [FeatureToggle; 9] = [
        Self::BulkMemory,
        Self::Memory64,
        Self::ModuleLinking,
        Self::MultiMemory,
        Self::MultiValue,
        Self::ReferenceTypes,
        Self::Simd,
        Self::TailCall,
        Self::Threads,
    ];

    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BulkMemory => "bulk-memory",
            Self::Memory64 => "memory64",
            Self::ModuleLinking => "module-linking",
            Self::MultiMemory => "multi-memory",
            Self::MultiValue => "multi-value",
            Self::ReferenceTypes => "reference-types",
            Self::Simd => "simd",
            Self::TailCall => "tail-call",
            Self::Threads => "threads",
        }
    }
}

/// What happens to a guest output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputPolicy {
    /// Forward to the host process stream.
    #[default]
    Inherit,
    /// Collect into an in-memory buffer readable by the embedder.
    Capture,
    /// Discard everything written.
    Ignore,
}

impl OutputPolicy {
    /// All policies, in declaration order.
    pub const ALL: [OutputPolicy; 3] = [Self::Inherit, Self::Capture, Self::Ignore];

    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inherit => "inherit",
            Self::Capture => "capture",
            Self::Ignore => "ignore",
        }
    }
}

/// Error returned when parsing one of the kinds in this module fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} `{input}`")]
pub struct ParseKindError {
    kind: &'static str,
    input: String,
}

macro_rules! kind_str_impls {
    ($ty:ty, $label:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseKindError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
                Self::ALL
                    .into_iter()
                    .find(|kind| kind.as_str() == normalized)
                    .ok_or_else(|| ParseKindError {
                        kind: $label,
                        input: s.to_string(),
                    })
            }
        }
    };
}

kind_str_impls!(EngineKind, "engine");
kind_str_impls!(CompilerKind, "compiler");
kind_str_impls!(FeatureToggle, "feature");
kind_str_impls!(OutputPolicy, "output policy");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_engine_kind() {
        assert_eq!("jit".parse::<EngineKind>(), Ok(EngineKind::Jit));
        assert_eq!("object_file".parse::<EngineKind>(), Ok(EngineKind::ObjectFile));
        assert_eq!("NATIVE".parse::<EngineKind>(), Ok(EngineKind::Native));
        assert!("dylib".parse::<EngineKind>().is_err());
    }

    #[test]
    fn test_parse_feature_toggle() {
        for toggle in FeatureToggle::ALL {
            assert_eq!(toggle.as_str().parse::<FeatureToggle>(), Ok(toggle));
        }
        assert_eq!("bulk_memory".parse::<FeatureToggle>(), Ok(FeatureToggle::BulkMemory));

        let err = "gc".parse::<FeatureToggle>().unwrap_err();
        assert_eq!(err.to_string(), "unknown feature `gc`");
    }

    #[test]
    fn test_ahead_of_time() {
        assert!(!EngineKind::Jit.is_ahead_of_time());
        assert!(EngineKind::Native.is_ahead_of_time());
        assert!(EngineKind::ObjectFile.is_ahead_of_time());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&FeatureToggle::ReferenceTypes).unwrap();
        assert_eq!(json, "\"reference-types\"");

        let policy: OutputPolicy = serde_json::from_str("\"capture\"").unwrap();
        assert_eq!(policy, OutputPolicy::Capture);
        assert_eq!(OutputPolicy::default(), OutputPolicy::Inherit);
    }

    #[test]
    fn test_parse_output_policy() {
        assert_eq!("Capture".parse::<OutputPolicy>(), Ok(OutputPolicy::Capture));
        assert_eq!(OutputPolicy::Ignore.to_string(), "ignore");
        assert!("pipe".parse::<OutputPolicy>().is_err());
    }
}
