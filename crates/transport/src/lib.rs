//! Peer-to-peer package transfers for the depot package store.
//!
//! When a package is missing locally, [`Transport::acquire`] starts exactly
//! one background fetch from a random node holding it, no matter how many
//! requests arrive at once. Every requester gets a [`PackageReader`] on the
//! growing local blob. A reader that catches up with the fetch waits until
//! more bytes are committed or the fetch ends.
//!
//! - [`TransferPort`]: committed size and terminal outcome of one fetch
//! - [`Transport`]: the table of running fetches (singleflight)
//! - [`PackageReader`]: blocking catch-up reads of the growing blob
//! - [`PeerClient`]: HTTP client for the peer transfer endpoint

pub mod error;
pub mod peer;
pub mod port;
pub mod reader;
pub mod registry;
mod worker;

pub use error::{TransportError, TransportResult};
pub use peer::PeerClient;
pub use port::{Outcome, PortState, TransferPort};
pub use reader::{PackageReader, TransferStream};
pub use registry::{CompletionHook, HookError, Transport};
