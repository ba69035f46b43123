//! Version information for corral.

/// Crate version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version string for clap's `--version`.
pub fn clap_version() -> &'static str {
    VERSION
}

/// Extended version string with build metadata.
pub fn long_version() -> String {
    format!(
        "{}\nprotocol: 2024-11-05\ntarget: {}",
        VERSION,
        std::env::consts::ARCH
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_version_contains_crate_version() {
        assert!(long_version().contains(VERSION));
    }
}
