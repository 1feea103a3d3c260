//! Synchronization state of one in-flight transfer.

use crate::error::TransportError;
use depot_core::PackageId;
use std::path::{Path, PathBuf};
use tokio::sync::watch;

/// Terminal outcome of a transfer.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Every byte of the blob was committed.
    Complete,
    /// The transfer failed; the blob file is gone.
    Failed(TransportError),
}

/// Bytes committed so far plus the terminal outcome, always updated together.
#[derive(Debug, Clone, Default)]
pub struct PortState {
    /// Bytes flushed to the local file. Never decreases.
    pub written: u64,
    /// `None` while the transfer is running. Set at most once.
    pub outcome: Option<Outcome>,
}

impl PortState {
    /// Whether the transfer has finished, either way.
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }
}

/// One in-flight fetch of one package.
///
/// The worker is the only writer of the state. Every update is broadcast
/// to all readers in the same step, so a reader that checks and waits
/// through a [`watch::Receiver`] cannot miss it.
#[derive(Debug)]
pub struct TransferPort {
    package_id: PackageId,
    local_path: PathBuf,
    state: watch::Sender<PortState>,
}

impl TransferPort {
    pub(crate) fn new(package_id: PackageId, local_path: PathBuf) -> Self {
        let (state, _) = watch::channel(PortState::default());
        Self {
            package_id,
            local_path,
            state,
        }
    }

    /// Package being fetched.
    pub fn package_id(&self) -> &PackageId {
        &self.package_id
    }

    /// Destination blob file.
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Bytes committed so far.
    pub fn written_size(&self) -> u64 {
        self.state.borrow().written
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> PortState {
        self.state.borrow().clone()
    }

    /// A receiver for waiting on state changes.
    pub fn subscribe(&self) -> watch::Receiver<PortState> {
        self.state.subscribe()
    }

    /// Advance the committed size by `bytes` and optionally set the outcome,
    /// then wake every waiter.
    pub(crate) fn publish(&self, bytes: u64, outcome: Option<Outcome>) {
        self.state.send_modify(|state| {
            state.written += bytes;
            if let Some(outcome) = outcome {
                if state.outcome.is_some() {
                    tracing::warn!(package_id = %self.package_id, "Ignoring second transfer outcome");
                } else {
                    state.outcome = Some(outcome);
                }
            }
        });
    }
}
