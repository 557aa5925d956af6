//! Messaging substrate contract.
//!
//! The core never owns message delivery — it talks to a publish/subscribe
//! and direct-messaging substrate through the [`MessageTransport`] trait.
//! [`InMemoryTransport`] is the loopback implementation used by tests and
//! single-process runs.

pub mod envelope;
pub mod transport;

pub use envelope::{Envelope, MessageId, Priority, ProtocolMessage};
pub use transport::{InMemoryTransport, MessageTransport, SendOptions, TransportError};
