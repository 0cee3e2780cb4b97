//! Broker interface
//!
//! The broker offers three primitives: create a tunnel, publish a payload
//! to a `(tunnel, sub-channel)` pair, and subscribe to the live stream of
//! payloads published there. [`HttpTransport`] talks to the hosted relay,
//! [`MemoryBroker`] keeps everything in-process for tests and simulations.

mod http;
mod memory;
mod provider;
mod sse;

pub use http::{
    BrokerRequest, CreateRandomRequest, CreateRequest, CreateResponse, HttpTransport,
    SendRequest, StreamRequest,
};
pub use memory::MemoryBroker;
pub use provider::{Subscription, Transport, TransportError};
pub use sse::SseParser;
