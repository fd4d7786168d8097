//! Version components of this build, for compatibility negotiation.

/// Full version string, e.g. `0.3.0` or `0.3.0-rc.1`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pre-release tag, empty for releases.
pub const PRE: &str = env!("CARGO_PKG_VERSION_PRE");

/// Major version component.
pub fn major() -> u8 {
    env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(u8::MAX)
}

/// Minor version component.
pub fn minor() -> u8 {
    env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(u8::MAX)
}

/// Patch version component.
pub fn patch() -> u8 {
    env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_match_version_string() {
        let expected = if PRE.is_empty() {
            format!("{}.{}.{}", major(), minor(), patch())
        } else {
            format!("{}.{}.{}-{PRE}", major(), minor(), patch())
        };
        assert_eq!(VERSION, expected);
    }
}
