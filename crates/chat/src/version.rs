use std::fmt;

/// Where and how this binary was built, as recorded by `build.rs`
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub version: &'static str,
    pub build_profile: &'static str,
    pub build_timestamp: &'static str,
    pub target: &'static str,
    pub rust_version: &'static str,
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tunnel {} ({}, {})\nbuilt {} with {}",
            self.version, self.build_profile, self.target, self.build_timestamp, self.rust_version
        )
    }
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("TUNNEL_REPO_VERSION"),
        build_profile: env!("TUNNEL_BUILD_PROFILE"),
        build_timestamp: env!("TUNNEL_BUILD_TIMESTAMP"),
        target: env!("TUNNEL_BUILD_TARGET"),
        rust_version: env!("TUNNEL_RUST_VERSION"),
    }
}
