//! Tunnel channels
//!
//! A [`TunnelChannel`] is the public face of the protocol. Underneath, the
//! generic [`Channel`] binds one `(tunnel, sub-channel)` pair to a
//! [`PayloadCodec`]; a tunnel runs one for its data (compression and
//! per-recipient sealing via [`Pipeline`]) and, with encryption on, a second
//! [`Plain`] one for the [`KeyExchange`].

#[allow(clippy::module_inception)]
mod channel;
mod config;
mod error;
mod key_exchange;
mod payload;
mod tunnel;

pub use channel::{Channel, ChannelEvent, EventHandler, SubscriptionHandle};
pub use config::{
    TunnelConfig, TunnelIdentity, DEFAULT_KEY_READY_TIMEOUT, KEY_EXCHANGE_SUB_CHANNEL,
    MAIN_SUB_CHANNEL,
};
pub use error::ChannelError;
pub use key_exchange::{KeyExchange, KeyExchangeOutcome};
pub use payload::{PayloadCodec, Pipeline, Plain, Sealer};
pub use tunnel::{ChannelState, TunnelChannel, TunnelChannelBuilder};
