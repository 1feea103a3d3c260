//! Reads of a blob that may still be growing.

use crate::error::{TransportError, TransportResult};
use crate::port::{Outcome, PortState, TransferPort};
use bytes::Bytes;
use depot_core::PackageId;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;

/// Stream of blob bytes produced by a transfer.
pub type TransferStream = Pin<Box<dyn Stream<Item = TransportResult<Bytes>> + Send>>;

/// Read handle on a blob being fetched by a transfer.
///
/// Each reader has its own cursor. When it catches up with the worker it
/// waits for more bytes or for the terminal outcome, never polling.
#[derive(Debug)]
pub struct PackageReader {
    file: File,
    port: Arc<TransferPort>,
    state: watch::Receiver<PortState>,
}

impl PackageReader {
    pub(crate) fn new(file: File, port: Arc<TransferPort>) -> Self {
        let state = port.subscribe();
        Self { file, port, state }
    }

    /// Package being read.
    pub fn package_id(&self) -> &PackageId {
        self.port.package_id()
    }

    /// Read up to `buf.len()` bytes.
    ///
    /// Returns `Ok(0)` only once the transfer completed and every byte was
    /// read. A failed transfer yields its error after the committed bytes.
    pub async fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        loop {
            let observed = self.state.borrow_and_update().written;

            let n = self.file.read(buf).await?;
            if n > 0 || buf.is_empty() {
                return Ok(n);
            }

            // Caught up. Check-and-wait is a single step on the receiver,
            // so a publish between the read and here is still seen.
            let state = self
                .state
                .wait_for(|s| s.written > observed || s.is_terminal())
                .await
                .map_err(|_| {
                    TransportError::LocalIo(Arc::new(std::io::Error::other(
                        "transfer port dropped",
                    )))
                })?;

            if state.written > observed {
                continue;
            }
            return match &state.outcome {
                Some(Outcome::Complete) => Ok(0),
                Some(Outcome::Failed(err)) => Err(err.clone()),
                None => continue,
            };
        }
    }

    /// Read everything until completion.
    pub async fn read_to_end(&mut self) -> TransportResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; depot_core::DEFAULT_CHUNK_SIZE];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    /// Adapt into a byte stream of chunks up to `chunk_size`.
    ///
    /// The stream ends after completion or after yielding the transfer error.
    pub fn into_stream(self, chunk_size: usize) -> TransferStream {
        let stream = async_stream::try_stream! {
            let mut reader = self;
            let mut buf = vec![0u8; chunk_size.max(1)];
            loop {
                let n = reader.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };
        Box::pin(stream)
    }

    /// Release the file handle. The transfer keeps running.
    pub fn close(self) {
        tracing::debug!(package_id = %self.port.package_id(), "Reader closed");
    }
}
