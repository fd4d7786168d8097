//! Optional WebAssembly proposals.

use std::collections::BTreeMap;

use wasmtime::Config;

use wasmbed_common::FeatureToggle;

/// Set of proposal toggles, all disabled by default.
///
/// Once handed to an [`EngineConfig`](crate::EngineConfig) the set is owned
/// by the configuration and can no longer be changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet {
    toggles: BTreeMap<FeatureToggle, bool>,
}

impl FeatureSet {
    /// Create a set with every toggle disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the engine in this build can honor `toggle` at all.
    ///
    /// Module linking was withdrawn in favor of the component model and has
    /// no engine-level switch. Reference types need the engine's GC runtime,
    /// which this build does not link.
    pub fn is_supported(toggle: FeatureToggle) -> bool {
        !matches!(
            toggle,
            FeatureToggle::ModuleLinking | FeatureToggle::ReferenceTypes
        )
    }

    /// Record `enable` for `toggle`.
    ///
    /// Returns `false`, leaving the set unchanged, if the toggle is not
    /// supported by this build.
    pub fn set(&mut self, toggle: FeatureToggle, enable: bool) -> bool {
        if !Self::is_supported(toggle) {
            tracing::warn!(feature = %toggle, "unsupported feature toggle ignored");
            return false;
        }
        self.toggles.insert(toggle, enable);
        true
    }

    /// Like [`set`](Self::set), looking the toggle up by name.
    ///
    /// Returns `false` for names that are not recognized.
    pub fn set_by_name(&mut self, name: &str, enable: bool) -> bool {
        match name.parse::<FeatureToggle>() {
            Ok(toggle) => self.set(toggle, enable),
            Err(err) => {
                tracing::warn!(error = %err, "unknown feature toggle ignored");
                false
            }
        }
    }

    /// Whether `toggle` is enabled.
    pub fn is_enabled(&self, toggle: FeatureToggle) -> bool {
        self.toggles.get(&toggle).copied().unwrap_or(false)
    }

    /// Enabled toggles, in declaration order.
    pub fn enabled(&self) -> impl Iterator<Item = FeatureToggle> + '_ {
        self.toggles
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(toggle, _)| *toggle)
    }

    /// Apply every supported toggle to an engine configuration.
    pub(crate) fn apply(&self, config: &mut Config) {
        let simd = self.is_enabled(FeatureToggle::Simd);

        config.wasm_bulk_memory(self.is_enabled(FeatureToggle::BulkMemory));
        config.wasm_memory64(self.is_enabled(FeatureToggle::Memory64));
        config.wasm_multi_memory(self.is_enabled(FeatureToggle::MultiMemory));
        config.wasm_multi_value(self.is_enabled(FeatureToggle::MultiValue));
        config.wasm_simd(simd);
        // Relaxed SIMD extends SIMD and cannot stay on without it.
        if !simd {
            config.wasm_relaxed_simd(false);
        }
        config.wasm_tail_call(self.is_enabled(FeatureToggle::TailCall));
        config.wasm_threads(self.is_enabled(FeatureToggle::Threads));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_all_disabled() {
        let features = FeatureSet::new();
        for toggle in FeatureToggle::ALL {
            assert!(!features.is_enabled(toggle));
        }
        assert_eq!(features.enabled().count(), 0);
    }

    #[test]
    fn test_set_supported() {
        let mut features = FeatureSet::new();

        assert!(features.set(FeatureToggle::Simd, true));
        assert!(features.is_enabled(FeatureToggle::Simd));

        assert!(features.set(FeatureToggle::Simd, false));
        assert!(!features.is_enabled(FeatureToggle::Simd));
    }

    #[test]
    fn test_set_twice_is_idempotent() {
        let mut once = FeatureSet::new();
        once.set(FeatureToggle::BulkMemory, true);

        let mut twice = FeatureSet::new();
        assert!(twice.set(FeatureToggle::BulkMemory, true));
        assert!(twice.set(FeatureToggle::BulkMemory, true));

        assert_eq!(once, twice);
    }

    #[test]
    fn test_unsupported_toggle_leaves_state_unchanged() {
        let mut features = FeatureSet::new();
        features.set(FeatureToggle::Threads, true);
        let before = features.clone();

        assert!(!features.set(FeatureToggle::ModuleLinking, true));
        assert_eq!(features, before);
        assert!(!features.is_enabled(FeatureToggle::ModuleLinking));
    }

    #[test]
    fn test_reference_types_not_supported() {
        assert!(!FeatureSet::is_supported(FeatureToggle::ReferenceTypes));

        let mut features = FeatureSet::new();
        assert!(!features.set(FeatureToggle::ReferenceTypes, true));
        assert!(!features.is_enabled(FeatureToggle::ReferenceTypes));
        assert_eq!(features, FeatureSet::new());
    }

    #[test]
    fn test_set_by_name() {
        let mut features = FeatureSet::new();

        assert!(features.set_by_name("tail-call", true));
        assert!(features.is_enabled(FeatureToggle::TailCall));

        let before = features.clone();
        assert!(!features.set_by_name("exceptions", true));
        assert!(!features.set_by_name("module-linking", true));
        assert!(!features.set_by_name("reference-types", true));
        assert_eq!(features, before);
    }

    #[test]
    fn test_enabled_order() {
        let mut features = FeatureSet::new();
        features.set(FeatureToggle::Threads, true);
        features.set(FeatureToggle::BulkMemory, true);
        features.set(FeatureToggle::Simd, false);

        let enabled: Vec<_> = features.enabled().collect();
        assert_eq!(enabled, vec![FeatureToggle::BulkMemory, FeatureToggle::Threads]);
    }
}
