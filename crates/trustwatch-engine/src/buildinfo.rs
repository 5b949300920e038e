//! Build metadata, populated once at compile time and read-only after.

/// Version, commit, and date of this build.
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    /// Crate version.
    pub version: &'static str,
    /// Git commit, when the build pipeline provides it.
    pub commit: &'static str,
    /// Build date, when the build pipeline provides it.
    pub date: &'static str,
}

/// The immutable build record.
pub const BUILD_INFO: BuildInfo = BuildInfo {
    version: env!("CARGO_PKG_VERSION"),
    commit: match option_env!("TRUSTWATCH_COMMIT") {
        Some(commit) => commit,
        None => "unknown",
    },
    date: match option_env!("TRUSTWATCH_BUILD_DATE") {
        Some(date) => date,
        None => "unknown",
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_comes_from_the_crate() {
        assert_eq!(BUILD_INFO.version, env!("CARGO_PKG_VERSION"));
        assert!(!BUILD_INFO.commit.is_empty());
    }
}
