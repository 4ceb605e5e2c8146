//! Realtime event distribution with push-first delivery and a polling
//! fallback tier.
//!
//! The central type is [`RealTimeDistributor`]: it owns the connection state
//! machine, the subscriber registry, and the background tasks doing channel
//! reads, periodic polls, and reconnect backoff. Transports are injected
//! behind the seams in [`transport`], so the whole state machine is testable
//! in-process.

pub mod backoff;
pub mod config;
pub mod distributor;
pub mod envelope;
pub mod error;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use config::LiveWireConfig;
pub use distributor::{
    ConnectionState, ConnectionType, DistributorStatus, EventCallback, RealTimeDistributor,
    Subscription,
};
pub use envelope::{event_types, DistributionEvent};
pub use error::TransportError;
pub use transport::{
    HttpPollTransport, PollTransport, PushEvent, PushSink, PushStream, PushTransport,
    WebSocketTransport,
};

#[cfg(test)]
mod tests;
