use depot_storage::ArchiveTool;
use std::path::Path;

/// Whether a working `tar` is on PATH. Archive tests skip without one.
#[allow(dead_code)]
pub async fn tar_available() -> bool {
    ArchiveTool::default().is_available().await
}

/// Populate `dir` with a `meta.json` and a payload file.
#[allow(dead_code)]
pub fn write_package_tree(dir: &Path, meta: &str, payload: &[u8]) {
    std::fs::create_dir_all(dir.join("bin")).unwrap();
    std::fs::write(dir.join("meta.json"), meta).unwrap();
    std::fs::write(dir.join("bin").join("tool"), payload).unwrap();
}
