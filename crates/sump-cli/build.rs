use std::env;
use std::process::Command;

// Embeds commit and date for `sump --version`. Packagers building outside a
// git checkout can set SUMP_BUILD_COMMIT / SUMP_BUILD_DATE themselves.
fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=SUMP_BUILD_COMMIT");
    println!("cargo:rerun-if-env-changed=SUMP_BUILD_DATE");

    let commit = from_env("SUMP_BUILD_COMMIT")
        .or_else(|| run_git(&["describe", "--always", "--dirty", "--abbrev=10"]))
        .unwrap_or_else(|| "unknown".to_string());
    let date = from_env("SUMP_BUILD_DATE")
        .or_else(|| run_git(&["log", "-1", "--format=%cs"]))
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=SUMP_BUILD_COMMIT={}", commit);
    println!("cargo:rustc-env=SUMP_BUILD_DATE={}", date);
}

fn from_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn run_git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() { None } else { Some(value) }
}
