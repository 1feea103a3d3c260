//! A peer whose response body is fed chunk by chunk from the test.

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::routing::get;
use bytes::Bytes;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};

type BodyItem = Result<Bytes, std::io::Error>;

/// Serves one transfer whose body the test controls.
#[allow(dead_code)]
pub struct ChunkedPeer {
    /// `host:port` to record in the membership store.
    pub addr: String,
    tx: Option<mpsc::UnboundedSender<BodyItem>>,
}

#[allow(dead_code)]
impl ChunkedPeer {
    /// Start listening on an ephemeral port.
    pub async fn start() -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<BodyItem>();
        let body_rx = Arc::new(Mutex::new(Some(rx)));

        let router = Router::new()
            .route("/capi/{key}/tran_pkg/{id}", get(serve))
            .with_state(body_rx);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind peer");
        let addr = listener.local_addr().expect("peer address").to_string();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self { addr, tx: Some(tx) }
    }

    /// Send the next body chunk.
    pub fn send(&self, data: &[u8]) {
        if let Some(tx) = &self.tx {
            tx.send(Ok(Bytes::copy_from_slice(data)))
                .expect("peer body receiver gone");
        }
    }

    /// End the body cleanly.
    pub fn finish(&mut self) {
        self.tx = None;
    }

    /// Abort the body mid-stream.
    pub fn fail(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(std::io::Error::other("peer aborted")));
        }
    }
}

async fn serve(
    State(body_rx): State<Arc<Mutex<Option<mpsc::UnboundedReceiver<BodyItem>>>>>,
) -> Body {
    let Some(mut rx) = body_rx.lock().await.take() else {
        return Body::empty();
    };
    Body::from_stream(async_stream::stream! {
        while let Some(item) = rx.recv().await {
            yield item;
        }
    })
}
