//! WASI snapshot versions and their import namespaces.

use wasmbed_core::ImportDescriptor;

/// Namespace of the first WASI snapshot.
pub const SNAPSHOT0_NAMESPACE: &str = "wasi_unstable";

/// Namespace of `wasi_snapshot_preview1`.
pub const SNAPSHOT1_NAMESPACE: &str = "wasi_snapshot_preview1";

/// A generation of the WASI import namespace convention.
///
/// The discriminants are part of the C boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum WasiVersion {
    /// The module's WASI imports do not follow one single known convention.
    Invalid = -1,
    /// The most recent snapshot supported. Only used to select a version;
    /// detection always reports a concrete snapshot.
    Latest = 0,
    Snapshot0 = 1,
    Snapshot1 = 2,
}

impl WasiVersion {
    /// The concrete snapshot this version stands for.
    pub fn resolve(self) -> Self {
        match self {
            Self::Latest => Self::Snapshot1,
            other => other,
        }
    }

    /// Import namespace served for this version, `None` for `Invalid`.
    pub fn namespace(self) -> Option<&'static str> {
        match self.resolve() {
            Self::Snapshot0 => Some(SNAPSHOT0_NAMESPACE),
            Self::Snapshot1 => Some(SNAPSHOT1_NAMESPACE),
            _ => None,
        }
    }

    /// The snapshot a namespace belongs to, if any.
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            SNAPSHOT0_NAMESPACE => Some(Self::Snapshot0),
            SNAPSHOT1_NAMESPACE => Some(Self::Snapshot1),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        i32::from(self as i8)
    }

    /// Inverse of [`as_i32`](Self::as_i32). Unknown values map to `Invalid`.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::Latest,
            1 => Self::Snapshot0,
            2 => Self::Snapshot1,
            _ => Self::Invalid,
        }
    }
}

impl std::fmt::Display for WasiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Invalid => "invalid",
            Self::Latest => "latest",
            Self::Snapshot0 => "snapshot0",
            Self::Snapshot1 => "snapshot1",
        })
    }
}

/// Whether a namespace looks like it is meant for WASI.
pub fn is_wasi_namespace(namespace: &str) -> bool {
    namespace.starts_with("wasi")
}

/// Classify a module's WASI imports.
///
/// Returns the snapshot all WASI-looking imports belong to. Imports spanning
/// several snapshots, an unknown `wasi*` namespace, or no WASI import at all
/// give `Invalid`.
pub fn detect_wasi_version(imports: &[ImportDescriptor]) -> WasiVersion {
    let mut detected = None;
    for import in imports.iter().filter(|i| is_wasi_namespace(&i.module)) {
        let Some(version) = WasiVersion::from_namespace(&import.module) else {
            return WasiVersion::Invalid;
        };
        match detected {
            None => detected = Some(version),
            Some(previous) if previous != version => return WasiVersion::Invalid,
            Some(_) => {}
        }
    }
    detected.unwrap_or(WasiVersion::Invalid)
}
