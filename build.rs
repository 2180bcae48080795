// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=PAXIBOX_VERSION");

    // Packaged builds (kiosk images) pin the version explicitly
    let version = match std::env::var("PAXIBOX_VERSION") {
        Ok(v) => v,
        Err(_) => kiosk_version(),
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// "0.1.0-abcdef1" for builds from a tagged commit, "0.1.0-dirty-abcdef1"
/// for builds after it, the crate version when git is unavailable.
fn kiosk_version() -> String {
    let pkg_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

    let described = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string());

    let Some(described) = described else {
        return pkg_version;
    };
    let described = described.strip_prefix('v').unwrap_or(&described);

    if described.contains('-') {
        let parts: Vec<&str> = described.rsplitn(3, '-').collect();
        if parts.len() >= 3 {
            let hash = parts[0].strip_prefix('g').unwrap_or(parts[0]);
            return format!("{}-dirty-{}", parts[2], hash);
        }
        return described.to_string();
    }

    match commit_hash() {
        // `describe --always` yields a bare hash when no tag exists
        Some(hash) if hash == described => format!("{}-{}", pkg_version, hash),
        Some(hash) => format!("{}-{}", described, hash),
        None => described.to_string(),
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
