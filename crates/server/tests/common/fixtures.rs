//! Test fixtures: sample data and package archives.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Whether tests may open listening sockets.
#[allow(dead_code)]
pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

/// Whether `tar` on PATH can write xz archives. Import tests skip without it.
#[allow(dead_code)]
pub fn xz_tar_available() -> bool {
    let Ok(dir) = tempfile::tempdir() else {
        return false;
    };
    let tree = dir.path().join("tree");
    if std::fs::create_dir(&tree).is_err() || std::fs::write(tree.join("f"), b"x").is_err() {
        return false;
    }
    Command::new("tar")
        .arg("-Jcf")
        .arg(dir.path().join("probe.tar.xz"))
        .arg("-C")
        .arg(&tree)
        .arg(".")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Generate deterministic test data based on a seed.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        chunk.copy_from_slice(&bytes[..chunk.len()]);
    }

    data
}

/// Build `<dir>/<name>.tar.xz` holding `meta.json` (if given) and a payload file.
#[allow(dead_code)]
pub fn make_archive(dir: &Path, name: &str, meta: Option<&str>, payload: &[u8]) -> PathBuf {
    let tree = dir.join(format!("{name}-tree"));
    std::fs::create_dir_all(tree.join("bin")).unwrap();
    if let Some(meta) = meta {
        std::fs::write(tree.join("meta.json"), meta).unwrap();
    }
    std::fs::write(tree.join("bin").join("tool"), payload).unwrap();

    let archive = dir.join(format!("{name}.tar.xz"));
    let status = Command::new("tar")
        .arg("-Jcf")
        .arg(&archive)
        .arg("-C")
        .arg(&tree)
        .arg(".")
        .status()
        .unwrap();
    assert!(status.success(), "tar failed to build {}", archive.display());
    archive
}

/// Unpack `archive` into a fresh directory under `dir` and parse its `meta.json`.
#[allow(dead_code)]
pub fn read_archive_meta(dir: &Path, archive: &Path) -> serde_json::Value {
    let out = tempfile::tempdir_in(dir).unwrap().keep();
    let status = Command::new("tar")
        .arg("-Jxf")
        .arg(archive)
        .arg("-C")
        .arg(&out)
        .status()
        .unwrap();
    assert!(status.success(), "tar failed to unpack {}", archive.display());
    let raw = std::fs::read(out.join("meta.json")).unwrap();
    serde_json::from_slice(&raw).unwrap()
}
