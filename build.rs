//! Stamps `thumbnailer --version` with the commit it was built from.
//!
//! Packagers building from a tarball can set `THUMBNAILER_GIT_HASH`.

use std::path::Path;
use std::process::Command;

const OVERRIDE: &str = "THUMBNAILER_GIT_HASH";

fn main() {
    println!("cargo:rerun-if-env-changed={OVERRIDE}");
    let hash = std::env::var(OVERRIDE)
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(short_hash)
        .unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env=GIT_HASH={}", hash.trim());

    watch_head(Path::new(".git"));
}

fn short_hash() -> Option<String> {
    let out = Command::new("git").args(["rev-parse", "--short", "HEAD"]).output().ok()?;
    if !out.status.success() {
        return None;
    }
    String::from_utf8(out.stdout).ok()
}

/// HEAD moves on checkout, the branch ref on commit.
fn watch_head(git_dir: &Path) {
    let head = git_dir.join("HEAD");
    println!("cargo:rerun-if-changed={}", head.display());
    let Ok(contents) = std::fs::read_to_string(&head) else {
        return;
    };
    if let Some(branch) = contents.strip_prefix("ref: ") {
        println!("cargo:rerun-if-changed={}", git_dir.join(branch.trim()).display());
    }
}
