use std::env;
use std::process::Command;

/// Run a command and return its trimmed stdout, if it succeeded
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn set_env(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-env-changed=CI_BUILD_REF");

    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    set_env("TUNNEL_BUILD_PROFILE", &profile);

    // CI ref, then git, then the crate version
    let version = env::var("CI_BUILD_REF")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| command_output("git", &["describe", "--always", "--dirty", "--tags"]))
        .or_else(|| env::var("CARGO_PKG_VERSION").ok())
        .unwrap_or_else(|| "unknown".to_string());
    set_env("TUNNEL_REPO_VERSION", &version);

    set_env("TUNNEL_BUILD_TIMESTAMP", &chrono::Utc::now().to_rfc3339());

    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    set_env("TUNNEL_BUILD_TARGET", &target);

    let rustc = command_output("rustc", &["--version"]).unwrap_or_else(|| "unknown".to_string());
    set_env("TUNNEL_RUST_VERSION", &rustc);
}
