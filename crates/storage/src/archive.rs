//! Calls to the external archive tool.
//!
//! Packages are xz-compressed tarballs. Packing and unpacking is delegated
//! to `tar` so the on-disk format matches what peers and clients produce.

use crate::error::{StorageError, StorageResult};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::instrument;

/// Handle on the configured `tar` executable.
#[derive(Clone, Debug)]
pub struct ArchiveTool {
    tar: PathBuf,
}

impl ArchiveTool {
    /// Use the executable at `tar` (a bare name is looked up on `PATH`).
    pub fn new(tar: impl Into<PathBuf>) -> Self {
        Self { tar: tar.into() }
    }

    /// Whether the executable can be run at all.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.tar)
            .arg("--version")
            .output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    /// Unpack `archive` into the existing directory `dir` (`tar -Jxf <archive> -C <dir>`).
    #[instrument(skip(self), fields(archive = %archive.display(), dir = %dir.display()))]
    pub async fn decompress(&self, archive: &Path, dir: &Path) -> StorageResult<()> {
        self.run([
            OsStr::new("-Jxf"),
            archive.as_os_str(),
            OsStr::new("-C"),
            dir.as_os_str(),
        ])
        .await
    }

    /// Pack the contents of `dir` into `out` (`tar -Jcf <out> -C <dir> .`).
    #[instrument(skip(self), fields(dir = %dir.display(), out = %out.display()))]
    pub async fn compress(&self, dir: &Path, out: &Path) -> StorageResult<()> {
        self.run([
            OsStr::new("-Jcf"),
            out.as_os_str(),
            OsStr::new("-C"),
            dir.as_os_str(),
            OsStr::new("."),
        ])
        .await
    }

    async fn run<'a>(&self, args: impl IntoIterator<Item = &'a OsStr>) -> StorageResult<()> {
        let output = Command::new(&self.tar)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::warn!(status = %output.status, stderr = %stderr, "Archive tool failed");
        Err(StorageError::Archive {
            status: output.status.to_string(),
            stderr,
        })
    }
}

impl Default for ArchiveTool {
    fn default() -> Self {
        Self::new("tar")
    }
}
