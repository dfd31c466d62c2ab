// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=MEALCAM_VERSION");

    // Packagers may pin the version string explicitly
    let version = match std::env::var("MEALCAM_VERSION") {
        Ok(v) => v,
        Err(_) => describe_version(),
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Build a version string of the form `<crate version>-<short hash>`,
/// or `<tag>-dirty-<hash>` when HEAD is ahead of the latest tag.
fn describe_version() -> String {
    let pkg_version = env!("CARGO_PKG_VERSION");

    let described = Command::new("git")
        .args(["describe", "--tags", "--match", "v*"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());

    let hash = commit_hash().unwrap_or_else(|| "unknown".to_string());

    match described {
        Some(tag) => {
            let tag = tag.strip_prefix('v').unwrap_or(&tag);
            // "0.1.0-5-gabcdef1" means five commits past the tag
            let parts: Vec<&str> = tag.rsplitn(3, '-').collect();
            if parts.len() >= 3 {
                format!("{}-dirty-{}", parts[2], hash)
            } else {
                format!("{}-{}", tag, hash)
            }
        }
        None => format!("{}-{}", pkg_version, hash),
    }
}

fn commit_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}
