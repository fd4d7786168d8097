//! Build-time capabilities, queried at run time.
//!
//! Which compilers are linked in is decided by Cargo features. Instead of
//! making whole groups of operations appear and disappear with those
//! features, the build is described once by a [`CapabilityRegistry`] and
//! every configuration is validated against it.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use wasmbed_common::{CompilerKind, EngineKind};

/// Read-only description of the engine kinds and compilers in a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityRegistry {
    compilers: BTreeSet<CompilerKind>,
    engines: BTreeSet<EngineKind>,
}

static GLOBAL: OnceLock<CapabilityRegistry> = OnceLock::new();

impl CapabilityRegistry {
    /// Describe a build with the given compilers.
    ///
    /// Loading precompiled artifacts (`Native`) never needs a compiler.
    /// `Jit` and `ObjectFile` are only available when at least one compiler
    /// is present.
    pub fn new(compilers: impl IntoIterator<Item = CompilerKind>) -> Self {
        let compilers: BTreeSet<_> = compilers.into_iter().collect();
        let mut engines = BTreeSet::from([EngineKind::Native]);
        if !compilers.is_empty() {
            engines.insert(EngineKind::Jit);
            engines.insert(EngineKind::ObjectFile);
        }
        Self { compilers, engines }
    }

    /// A build without any compiler.
    pub fn headless() -> Self {
        Self::new([])
    }

    /// The registry describing the running binary, built on first use.
    pub fn global() -> &'static CapabilityRegistry {
        GLOBAL.get_or_init(|| {
            let registry = Self::new(linked_compilers());
            tracing::debug!(
                compilers = ?registry.compilers,
                engines = ?registry.engines,
                "capability registry initialized"
            );
            registry
        })
    }

    /// Whether `kind` is linked into this build.
    pub fn is_compiler_available(&self, kind: CompilerKind) -> bool {
        self.compilers.contains(&kind)
    }

    /// Whether `kind` can be realized in this build.
    pub fn is_engine_available(&self, kind: EngineKind) -> bool {
        self.engines.contains(&kind)
    }

    /// Whether this build has no compiler at all.
    pub fn is_headless(&self) -> bool {
        self.compilers.is_empty()
    }

    /// The compiler used when a configuration does not name one.
    pub fn default_compiler(&self) -> Option<CompilerKind> {
        self.compilers.first().copied()
    }

    /// Available compilers, in declaration order.
    pub fn compilers(&self) -> impl Iterator<Item = CompilerKind> + '_ {
        self.compilers.iter().copied()
    }

    /// Available engine kinds, in declaration order.
    pub fn engines(&self) -> impl Iterator<Item = EngineKind> + '_ {
        self.engines.iter().copied()
    }

    /// Snapshot of the registry, suitable for display.
    pub fn summary(&self) -> CapabilitySummary {
        CapabilitySummary {
            engines: self.engines().collect(),
            compilers: self.compilers().collect(),
        }
    }
}

/// Sorted lists of the engine kinds and compilers in a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySummary {
    pub engines: Vec<EngineKind>,
    pub compilers: Vec<CompilerKind>,
}

impl std::fmt::Display for CapabilitySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let join = |names: Vec<&str>| {
            if names.is_empty() {
                "none".to_string()
            } else {
                names.join(", ")
            }
        };
        writeln!(
            f,
            "engines:   {}",
            join(self.engines.iter().map(|e| e.as_str()).collect())
        )?;
        write!(
            f,
            "compilers: {}",
            join(self.compilers.iter().map(|c| c.as_str()).collect())
        )
    }
}

fn linked_compilers() -> Vec<CompilerKind> {
    let mut compilers = Vec::new();
    if cfg!(feature = "cranelift") {
        compilers.push(CompilerKind::Cranelift);
    }
    if cfg!(feature = "winch") {
        compilers.push(CompilerKind::Singlepass);
    }
    compilers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_has_no_compiler() {
        let registry = CapabilityRegistry::headless();

        assert!(registry.is_headless());
        for kind in CompilerKind::ALL {
            assert!(!registry.is_compiler_available(kind));
        }
        assert!(registry.default_compiler().is_none());
    }

    #[test]
    fn test_headless_engines() {
        let registry = CapabilityRegistry::headless();

        assert!(registry.is_engine_available(EngineKind::Native));
        assert!(!registry.is_engine_available(EngineKind::Jit));
        assert!(!registry.is_engine_available(EngineKind::ObjectFile));
    }

    #[test]
    fn test_with_compiler() {
        let registry = CapabilityRegistry::new([CompilerKind::Singlepass, CompilerKind::Cranelift]);

        assert!(!registry.is_headless());
        assert!(registry.is_compiler_available(CompilerKind::Cranelift));
        assert!(!registry.is_compiler_available(CompilerKind::Llvm));
        assert_eq!(registry.default_compiler(), Some(CompilerKind::Cranelift));
        for kind in EngineKind::ALL {
            assert!(registry.is_engine_available(kind));
        }
    }

    #[test]
    fn test_summary() {
        let summary = CapabilityRegistry::headless().summary();

        assert_eq!(summary.engines, vec![EngineKind::Native]);
        assert!(summary.compilers.is_empty());
        assert_eq!(summary.to_string(), "engines:   native\ncompilers: none");
    }

    #[test]
    fn test_global_matches_features() {
        let registry = CapabilityRegistry::global();

        assert_eq!(
            registry.is_compiler_available(CompilerKind::Cranelift),
            cfg!(feature = "cranelift")
        );
        assert_eq!(
            registry.is_compiler_available(CompilerKind::Singlepass),
            cfg!(feature = "winch")
        );
        assert!(!registry.is_compiler_available(CompilerKind::Llvm));
        if registry.is_headless() {
            for kind in CompilerKind::ALL {
                assert!(!registry.is_compiler_available(kind));
            }
        }
    }
}
