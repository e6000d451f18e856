//! Stamps the desk build id shown in the TUI header and startup log.
//!
//! `DESK_BUILD` may be set by packaging scripts that build outside a git
//! checkout; otherwise `git describe` is used.

use std::env;
use std::process::Command;

fn describe() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--always", "--dirty=-modified", "--abbrev=8"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let id = String::from_utf8(output.stdout).ok()?;
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

fn main() {
    let build = env::var("DESK_BUILD")
        .ok()
        .filter(|id| !id.trim().is_empty())
        .or_else(describe)
        .unwrap_or_else(|| format!("{}-dev", env::var("CARGO_PKG_VERSION").unwrap_or_default()));

    println!("cargo:rustc-env=DESK_BUILD={}", build);
    println!("cargo:rerun-if-env-changed=DESK_BUILD");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
}
