//! Target machine descriptions for ahead-of-time compilation.
//!
//! A [`TargetDescriptor`] pairs a [`Triple`] with the [`CpuFeatureSet`]
//! assumed on that machine. Whether the CPU features belong to the triple's
//! architecture is only checked when the descriptor is realized as part of an
//! engine configuration.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use target_lexicon::Architecture;

use wasmbed_common::RuntimeError;

/// Architecture families CPU features are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchFamily {
    X86_64,
    Aarch64,
    Other,
}

impl fmt::Display for ArchFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::Other => "other",
        })
    }
}

/// A machine descriptor of the form `<arch>-<vendor>-<os>[-<env>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    inner: target_lexicon::Triple,
}

impl Triple {
    /// The triple of the machine running this process.
    pub fn host() -> Self {
        Self {
            inner: target_lexicon::Triple::host(),
        }
    }

    /// Architecture family of this triple.
    pub fn family(&self) -> ArchFamily {
        match self.inner.architecture {
            Architecture::X86_64 => ArchFamily::X86_64,
            Architecture::Aarch64(_) => ArchFamily::Aarch64,
            _ => ArchFamily::Other,
        }
    }

    /// Whether this triple describes the host.
    pub fn is_host(&self) -> bool {
        self.inner == target_lexicon::Triple::host()
    }

    /// The underlying `target-lexicon` triple.
    pub fn as_lexicon(&self) -> &target_lexicon::Triple {
        &self.inner
    }
}

impl FromStr for Triple {
    type Err = RuntimeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let components: Vec<&str> = text.split('-').collect();
        if !(3..=4).contains(&components.len()) {
            return Err(RuntimeError::invalid_triple(
                text,
                format!(
                    "expected `<arch>-<vendor>-<os>[-<env>]`, found {} component(s)",
                    components.len()
                ),
            ));
        }
        if components.iter().any(|c| c.is_empty()) {
            return Err(RuntimeError::invalid_triple(text, "empty component"));
        }

        let inner = target_lexicon::Triple::from_str(text)
            .map_err(|e| RuntimeError::invalid_triple(text, e.to_string()))?;
        if inner.architecture == Architecture::Unknown {
            return Err(RuntimeError::invalid_triple(text, "unknown architecture"));
        }

        Ok(Self { inner })
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

/// A recognized CPU feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CpuFeature {
    Sse2,
    Sse3,
    Ssse3,
    Sse41,
    Sse42,
    Popcnt,
    Avx,
    Bmi1,
    Bmi2,
    Avx2,
    Avx512dq,
    Avx512vl,
    Avx512f,
    Lzcnt,
    Lse,
    Pauth,
}

impl CpuFeature {
    /// All recognized features.
    pub const ALL: [CpuFeature; 16] = [
        Self::Sse2,
        Self::Sse3,
        Self::Ssse3,
        Self::Sse41,
        Self::Sse42,
        Self::Popcnt,
        Self::Avx,
        Self::Bmi1,
        Self::Bmi2,
        Self::Avx2,
        Self::Avx512dq,
        Self::Avx512vl,
        Self::Avx512f,
        Self::Lzcnt,
        Self::Lse,
        Self::Pauth,
    ];

    /// Canonical name, as accepted by [`CpuFeatureSet::add`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sse2 => "sse2",
            Self::Sse3 => "sse3",
            Self::Ssse3 => "ssse3",
            Self::Sse41 => "sse4.1",
            Self::Sse42 => "sse4.2",
            Self::Popcnt => "popcnt",
            Self::Avx => "avx",
            Self::Bmi1 => "bmi",
            Self::Bmi2 => "bmi2",
            Self::Avx2 => "avx2",
            Self::Avx512dq => "avx512dq",
            Self::Avx512vl => "avx512vl",
            Self::Avx512f => "avx512f",
            Self::Lzcnt => "lzcnt",
            Self::Lse => "lse",
            Self::Pauth => "pauth",
        }
    }

    /// Architecture family the feature belongs to.
    pub fn family(self) -> ArchFamily {
        match self {
            Self::Lse | Self::Pauth => ArchFamily::Aarch64,
            _ => ArchFamily::X86_64,
        }
    }

    /// Name of the code generator setting that enables the feature, if the
    /// feature is not part of the architecture baseline.
    pub fn codegen_flag(self) -> Option<&'static str> {
        match self {
            Self::Sse2 => None,
            Self::Sse3 => Some("has_sse3"),
            Self::Ssse3 => Some("has_ssse3"),
            Self::Sse41 => Some("has_sse41"),
            Self::Sse42 => Some("has_sse42"),
            Self::Popcnt => Some("has_popcnt"),
            Self::Avx => Some("has_avx"),
            Self::Bmi1 => Some("has_bmi1"),
            Self::Bmi2 => Some("has_bmi2"),
            Self::Avx2 => Some("has_avx2"),
            Self::Avx512dq => Some("has_avx512dq"),
            Self::Avx512vl => Some("has_avx512vl"),
            Self::Avx512f => Some("has_avx512f"),
            Self::Lzcnt => Some("has_lzcnt"),
            Self::Lse => Some("has_lse"),
            Self::Pauth => Some("has_pauth"),
        }
    }
}

impl FromStr for CpuFeature {
    type Err = ();

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let name = name.trim().to_ascii_lowercase();
        let name = match name.as_str() {
            "sse4_1" | "sse41" => "sse4.1",
            "sse4_2" | "sse42" => "sse4.2",
            "bmi1" => "bmi",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|feature| feature.as_str() == name)
            .ok_or(())
    }
}

impl fmt::Display for CpuFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An additive set of CPU features.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuFeatureSet {
    features: BTreeSet<CpuFeature>,
}

impl CpuFeatureSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the feature called `name`.
    ///
    /// Returns `false` for names that are not recognized. No check against
    /// any architecture happens here.
    pub fn add(&mut self, name: &str) -> bool {
        match name.parse::<CpuFeature>() {
            Ok(feature) => {
                self.features.insert(feature);
                true
            }
            Err(()) => {
                tracing::warn!(feature = name, "unknown CPU feature ignored");
                false
            }
        }
    }

    /// Whether `feature` is in the set.
    pub fn contains(&self, feature: CpuFeature) -> bool {
        self.features.contains(&feature)
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Features in the set, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = CpuFeature> + '_ {
        self.features.iter().copied()
    }
}

/// A target machine for ahead-of-time compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    triple: Triple,
    cpu_features: CpuFeatureSet,
}

impl TargetDescriptor {
    /// Take ownership of `triple` and `cpu_features`.
    pub fn new(triple: Triple, cpu_features: CpuFeatureSet) -> Self {
        Self {
            triple,
            cpu_features,
        }
    }

    /// The host machine with no extra CPU features.
    pub fn host() -> Self {
        Self::new(Triple::host(), CpuFeatureSet::new())
    }

    pub fn triple(&self) -> &Triple {
        &self.triple
    }

    pub fn cpu_features(&self) -> &CpuFeatureSet {
        &self.cpu_features
    }

    /// Whether the target is the host machine.
    pub fn is_host(&self) -> bool {
        self.triple.is_host()
    }

    /// Check that every CPU feature belongs to the triple's architecture.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        let family = self.triple.family();
        if let Some(foreign) = self.cpu_features.iter().find(|f| f.family() != family) {
            return Err(RuntimeError::invalid_config(format!(
                "CPU feature `{foreign}` is for {}, but the target `{}` is {family}",
                foreign.family(),
                self.triple
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_triple() {
        let triple: Triple = "x86_64-unknown-linux-gnu".parse().unwrap();
        assert_eq!(triple.to_string(), "x86_64-unknown-linux-gnu");
        assert_eq!(triple.family(), ArchFamily::X86_64);

        let triple: Triple = "aarch64-apple-darwin".parse().unwrap();
        assert_eq!(triple.family(), ArchFamily::Aarch64);
    }

    #[test]
    fn test_parse_malformed_triple() {
        for text in ["", "x86_64", "x86_64-linux", "x86_64--linux", "a-b-c-d-e"] {
            let err = text.parse::<Triple>().unwrap_err();
            assert!(matches!(err, RuntimeError::InvalidTriple { .. }), "{text}");
        }
        assert!("notanarch-unknown-linux".parse::<Triple>().is_err());
    }

    #[test]
    fn test_host_triple() {
        let host = Triple::host();
        assert!(host.is_host());

        let reparsed: Triple = host.to_string().parse().unwrap();
        assert_eq!(reparsed, host);
    }

    #[test]
    fn test_cpu_feature_names() {
        let mut features = CpuFeatureSet::new();
        assert!(features.add("sse4.2"));
        assert!(features.add("AVX2"));
        assert!(features.add("bmi1"));
        assert!(!features.add("quantum"));
        assert!(!features.add(""));

        assert_eq!(features.len(), 3);
        assert!(features.contains(CpuFeature::Sse42));
        assert!(features.contains(CpuFeature::Bmi1));
    }

    #[test]
    fn test_cpu_feature_set_is_additive() {
        let mut features = CpuFeatureSet::new();
        assert!(features.add("avx"));
        assert!(features.add("avx"));
        assert_eq!(features.len(), 1);
    }

    #[test]
    fn test_add_does_not_check_architecture() {
        let mut features = CpuFeatureSet::new();
        assert!(features.add("lse"));
        assert!(features.add("avx2"));
        assert_eq!(features.len(), 2);
    }

    #[test]
    fn test_target_from_host() {
        let target = TargetDescriptor::new(Triple::host(), CpuFeatureSet::new());
        assert_eq!(target.triple().to_string(), Triple::host().to_string());
        assert!(target.is_host());
        assert!(target.validate().is_ok());
    }

    #[test]
    fn test_target_validation_rejects_foreign_features() {
        let mut features = CpuFeatureSet::new();
        features.add("lse");
        let target = TargetDescriptor::new("x86_64-unknown-linux-gnu".parse().unwrap(), features);

        let err = target.validate().unwrap_err();
        assert!(err.to_string().contains("lse"));
    }

    #[test]
    fn test_target_validation_accepts_matching_features() {
        let mut features = CpuFeatureSet::new();
        features.add("lse");
        features.add("pauth");
        let target = TargetDescriptor::new("aarch64-unknown-linux-gnu".parse().unwrap(), features);

        assert!(target.validate().is_ok());
        assert!(!target.cpu_features().is_empty());
    }
}
