//! Connected UDP socket owned by one probe.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::Transport;
use crate::error::{Error, Result};
use crate::util::bind_ephemeral_udp_socket;

const RECV_BUFFER: usize = 65535;

/// Connected UDP socket.
///
/// Connecting makes the kernel filter datagrams from other peers and report
/// ICMP port-unreachable as `ConnectionRefused` on the next call.
pub struct UdpTransport {
    socket: UdpSocket,
    target: SocketAddr,
    recv_buf: Mutex<Vec<u8>>,
}

impl UdpTransport {
    pub async fn connect(target: SocketAddr) -> Result<Self> {
        let network = |source| Error::Network { target, source }.boxed();

        let socket = bind_ephemeral_udp_socket(target).map_err(network)?;
        socket.connect(target).await.map_err(network)?;

        tracing::debug!(
            target: "snmp_credcheck::transport",
            { snmp.target = %target, snmp.local_addr = ?socket.local_addr().ok() },
            "UDP socket connected"
        );
        Ok(Self {
            socket,
            target,
            recv_buf: Mutex::new(vec![0u8; RECV_BUFFER]),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}

impl Transport for UdpTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        tracing::trace!(target: "snmp_credcheck::transport", { snmp.target = %self.target, snmp.bytes = data.len() }, "UDP send");
        self.socket.send(data).await.map_err(|source| {
            Error::Network {
                target: self.target,
                source,
            }
            .boxed()
        })?;
        Ok(())
    }

    async fn recv(&self, deadline: Instant) -> Result<Option<Bytes>> {
        let mut buf = self.recv_buf.lock().await;
        match tokio::time::timeout_at(deadline, self.socket.recv(&mut buf[..])).await {
            Ok(Ok(len)) => {
                tracing::trace!(target: "snmp_credcheck::transport", { snmp.target = %self.target, snmp.bytes = len }, "UDP recv");
                Ok(Some(Bytes::copy_from_slice(&buf[..len])))
            }
            Ok(Err(source)) => {
                tracing::debug!(target: "snmp_credcheck::transport", { snmp.target = %self.target, error = %source }, "UDP recv error");
                Err(Error::Network {
                    target: self.target,
                    source,
                }
                .boxed())
            }
            Err(_) => Ok(None),
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.target
    }
}
