//! Package blob files on the local filesystem.

use crate::error::{StorageError, StorageResult};
use bytes::Bytes;
use depot_core::PackageId;
use futures::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::instrument;

/// Stream of blob bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Directory under the storage root that holds blobs and staging dirs.
const PACKAGE_DIR: &str = "package";

/// Local store of compressed package blobs.
///
/// Layout:
/// - `<root>/package/<id>.tar.xz`: the blob
/// - `<root>/package/<id>/`: staging directory used while (re)packing
#[derive(Clone, Debug)]
pub struct BlobStore {
    root: PathBuf,
    package_dir: PathBuf,
}

impl BlobStore {
    /// Create a blob store rooted at `root`, creating the package directory.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        let package_dir = root.join(PACKAGE_DIR);
        fs::create_dir_all(&package_dir).await?;
        Ok(Self { root, package_dir })
    }

    /// Storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the blob for `id`.
    pub fn blob_path(&self, id: &PackageId) -> PathBuf {
        self.package_dir.join(id.blob_file_name())
    }

    /// Path of the staging directory for `id`.
    pub fn staging_dir(&self, id: &PackageId) -> PathBuf {
        self.package_dir.join(id.as_str())
    }

    /// Create a fresh, empty blob file for `id`.
    ///
    /// A stale file is unlinked first rather than truncated, so handles still
    /// open on it keep their bytes.
    #[instrument(skip(self), fields(backend = "filesystem", package_id = %id))]
    pub async fn create_empty(&self, id: &PackageId) -> StorageResult<()> {
        let path = self.blob_path(id);
        match fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed stale blob"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::Io(e)),
        }
        fs::File::create(&path).await?;
        Ok(())
    }

    /// Open the blob for reading from offset 0.
    #[instrument(skip(self), fields(backend = "filesystem", package_id = %id))]
    pub async fn open_read(&self, id: &PackageId) -> StorageResult<fs::File> {
        fs::File::open(self.blob_path(id))
            .await
            .map_err(|e| StorageError::from_io(e, id.as_str()))
    }

    /// Open an existing blob for writing from offset 0, without truncating.
    #[instrument(skip(self), fields(backend = "filesystem", package_id = %id))]
    pub async fn open_write(&self, id: &PackageId) -> StorageResult<fs::File> {
        fs::OpenOptions::new()
            .write(true)
            .open(self.blob_path(id))
            .await
            .map_err(|e| StorageError::from_io(e, id.as_str()))
    }

    /// Remove the blob. A missing blob is not an error.
    #[instrument(skip(self), fields(backend = "filesystem", package_id = %id))]
    pub async fn remove_blob(&self, id: &PackageId) -> StorageResult<()> {
        match fs::remove_file(self.blob_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Whether a blob file exists for `id`.
    #[instrument(skip(self), fields(backend = "filesystem", package_id = %id))]
    pub async fn blob_exists(&self, id: &PackageId) -> StorageResult<bool> {
        fs::try_exists(self.blob_path(id))
            .await
            .map_err(StorageError::Io)
    }

    /// Current size of the blob in bytes.
    #[instrument(skip(self), fields(backend = "filesystem", package_id = %id))]
    pub async fn blob_size(&self, id: &PackageId) -> StorageResult<u64> {
        let metadata = fs::metadata(self.blob_path(id))
            .await
            .map_err(|e| StorageError::from_io(e, id.as_str()))?;
        Ok(metadata.len())
    }

    /// Stream a complete local blob in chunks of `chunk_size`.
    #[instrument(skip(self), fields(backend = "filesystem", package_id = %id))]
    pub async fn stream_blob(&self, id: &PackageId, chunk_size: usize) -> StorageResult<ByteStream> {
        let file = self.open_read(id).await?;

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; chunk_size.max(1)];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    /// Create the staging directory for `id` with owner-only permissions.
    ///
    /// Fails with [`StorageError::AlreadyExists`] if it is already present.
    #[instrument(skip(self), fields(backend = "filesystem", package_id = %id))]
    pub async fn create_staging(&self, id: &PackageId) -> StorageResult<PathBuf> {
        let dir = self.staging_dir(id);
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        builder.mode(0o700);
        builder
            .create(&dir)
            .await
            .map_err(|e| StorageError::from_io(e, dir.display().to_string()))?;
        Ok(dir)
    }

    /// Remove the staging directory for `id`. A missing directory is not an error.
    #[instrument(skip(self), fields(backend = "filesystem", package_id = %id))]
    pub async fn remove_staging(&self, id: &PackageId) -> StorageResult<()> {
        match fs::remove_dir_all(self.staging_dir(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Verify the package directory exists and is a directory.
    #[instrument(skip(self), fields(backend = "filesystem"))]
    pub async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.package_dir).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("package directory is not a directory: {:?}", self.package_dir),
            )));
        }

        Ok(())
    }
}
