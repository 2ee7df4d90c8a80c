//! Reference synchronization between two replicas of the object graph.
//!
//! The receiving side runs a three-phase exchange, one phase at a time:
//!
//! 1. **Advertise**: every local reference goes out as
//!    `hex(target) refs/heads/<name>`, followed by a flush line.
//! 2. **Await updates**: update requests `hex(from) hex(to) <name>` are read
//!    until a flush line; malformed lines are dropped.
//! 3. **Validate transfer**: the supplied objects are indexed and each
//!    update is accepted only if `from` is an ancestor of `to`. Updates are
//!    independent: one rejection never blocks another.
//!
//! A status report closes the exchange. The sending side lives in
//! [`client`] and [`negotiation`]; [`codec`] frames lines for byte streams.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod line;
pub mod negotiation;
pub mod pack;
pub mod session;
pub mod transport;
pub mod types;
pub mod verifier;

pub use client::{read_advertisement, read_report, send_updates};
pub use codec::PktLineCodec;
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use line::ProtoLine;
pub use negotiation::PushPlan;
pub use pack::{PackIndex, TransferView};
pub use session::ReceiveSession;
pub use transport::{line_queue, LineSink, LineSource, PackReceiver, QueueSink};
pub use types::{Phase, ReceiveReport, RefStatus, RefUpdate, RefUpdateOutcome};
pub use verifier::FastForwardVerifier;
