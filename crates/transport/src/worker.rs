//! Background fetch of one package from a peer.

use crate::error::{TransportError, TransportResult};
use crate::port::{Outcome, TransferPort};
use crate::registry::Shared;
use depot_core::PackageId;
use futures::TryStreamExt;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

/// Fetch the blob for `port`, starting with `node`, then retire the port.
///
/// Runs exactly once per port.
pub(crate) async fn run(shared: Arc<Shared>, port: Arc<TransferPort>, node: String) {
    let id = port.package_id().clone();

    match fetch(&shared, &port, node).await {
        Ok(bytes) => {
            tracing::info!(package_id = %id, bytes, "Transfer complete");
            let mut remove_blob = false;
            if let Some(hook) = &shared.hook {
                match hook.on_complete(&id, port.local_path()).await {
                    Ok(()) => tracing::debug!(package_id = %id, "Completion hook succeeded"),
                    Err(e) => {
                        tracing::error!(package_id = %id, error = %e, "Completion hook failed");
                        remove_blob = true;
                    }
                }
            }
            shared.retire(&port, remove_blob).await;
        }
        Err(err) => {
            tracing::warn!(package_id = %id, error = %err, "Transfer failed");
            // Retire before publishing, so a reader that sees the failure
            // and retries starts a new transfer.
            shared.retire(&port, true).await;
            port.publish(0, Some(Outcome::Failed(err)));
        }
    }
}

/// Copy the peer response into the blob, publishing progress per chunk.
///
/// On success the completion has been published and the byte count is
/// returned. On failure the committed bytes have been published but the
/// outcome has not.
async fn fetch(shared: &Shared, port: &TransferPort, node: String) -> TransportResult<u64> {
    let id = port.package_id();
    let (node, response) = open_peer(shared, id, node).await?;

    let mut file = shared.blobs.open_write(id).await?;
    let body = response.bytes_stream().map_err(std::io::Error::other);
    let mut body = StreamReader::new(Box::pin(body));
    let mut buf = vec![0u8; shared.config.chunk_size.max(1)];
    let mut total = 0u64;

    loop {
        let n = match body.read(&mut buf).await {
            Ok(0) => {
                port.publish(0, Some(Outcome::Complete));
                return Ok(total);
            }
            Ok(n) => n,
            Err(e) => {
                return Err(TransportError::PeerFetchFailed {
                    node,
                    reason: e.to_string(),
                });
            }
        };

        let written = write_chunk(&mut file, &buf[..n]).await;
        let committed = match &written {
            Ok(()) => n,
            Err((committed, _)) => *committed,
        };
        total += committed as u64;
        port.publish(committed as u64, None);
        if let Err((_, e)) = written {
            return Err(e.into());
        }
    }
}

/// Select a peer and start the request, retrying failures per config.
///
/// Nothing has been written yet, so any failure here may be retried with a
/// freshly selected peer.
async fn open_peer(
    shared: &Shared,
    id: &PackageId,
    first: String,
) -> TransportResult<(String, reqwest::Response)> {
    let mut candidate = Some(first);
    let mut attempt = 0u32;

    loop {
        let result = match candidate.take() {
            Some(node) => Ok(node),
            None => shared.select_peer(id).await,
        };
        let result = match result {
            Ok(node) => {
                tracing::debug!(package_id = %id, node = %node, attempt, "Fetching from peer");
                shared
                    .peers
                    .fetch(&node, id)
                    .await
                    .map(|response| (node, response))
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(opened) => return Ok(opened),
            Err(e) if attempt < shared.config.peer_retries => {
                attempt += 1;
                let delay = shared.config.retry_backoff(attempt);
                tracing::warn!(
                    package_id = %id,
                    error = %e,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Peer fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Write `data` and flush it, so readers can see every committed byte.
///
/// On error, returns how many bytes were committed before it.
async fn write_chunk(file: &mut File, data: &[u8]) -> Result<(), (usize, std::io::Error)> {
    let mut done = 0;
    while done < data.len() {
        let n = match file.write(&data[done..]).await {
            Ok(0) => return Err((done, std::io::ErrorKind::WriteZero.into())),
            Ok(n) => n,
            Err(e) => return Err((done, e)),
        };
        file.flush().await.map_err(|e| (done, e))?;
        done += n;
    }
    Ok(())
}
