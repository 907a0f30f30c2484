//! Datagram transport used by the client.
//!
//! A transport is scoped to one probe: it is created when the probe starts
//! and its socket closes when the probe's future completes or is dropped.

mod udp;

#[cfg(test)]
mod mock;

pub use udp::UdpTransport;

#[cfg(test)]
pub(crate) use mock::MockTransport;

use std::future::Future;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::time::Instant;

use crate::error::Result;

/// Client-side datagram exchange with a single peer.
pub trait Transport: Send + Sync {
    /// Send one datagram to the peer.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Next datagram from the peer, or `None` once `deadline` passes.
    ///
    /// Matching datagrams to requests is the caller's job.
    fn recv(&self, deadline: Instant) -> impl Future<Output = Result<Option<Bytes>>> + Send;

    fn peer_addr(&self) -> SocketAddr;
}
