//! Stamps `--version` with the commit and build date as `JSONNI_BUILD_INFO`.

use std::path::Path;
use std::process::Command;

use chrono::{DateTime, Utc};

fn main() {
    let head = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../.git/HEAD");
    if head.exists() {
        println!("cargo::rerun-if-changed={}", head.display());
    }
    println!("cargo::rerun-if-env-changed=SOURCE_DATE_EPOCH");

    let commit = commit().unwrap_or_else(|| "unknown".to_string());
    println!("cargo::rustc-env=JSONNI_BUILD_INFO={commit} {}", build_date());
}

/// Short commit id, marked `-dirty` when the tree has local changes.
fn commit() -> Option<String> {
    let out = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()?;
    out.status
        .success()
        .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// Build date, pinned by `SOURCE_DATE_EPOCH` for reproducible builds.
fn build_date() -> String {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|secs| secs.parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
        .format("%Y-%m-%d")
        .to_string()
}
