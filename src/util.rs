//! Socket and identifier helpers.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

/// Bind a non-blocking UDP socket.
///
/// IPv6 sockets get `IPV6_V6ONLY` so v4-mapped traffic never reaches them.
pub(crate) fn bind_udp_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}

/// Ephemeral socket in the address family of `target`.
pub(crate) fn bind_ephemeral_udp_socket(target: SocketAddr) -> io::Result<UdpSocket> {
    let unspecified = if target.is_ipv6() {
        IpAddr::V6(Ipv6Addr::UNSPECIFIED)
    } else {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    };
    bind_udp_socket(SocketAddr::new(unspecified, 0))
}

/// Random starting point for request and message IDs, in `1..=0x3FFF_FFFF`
/// so a probe's handful of increments stays positive.
pub(crate) fn random_request_id() -> i32 {
    let mut buf = [0u8; 4];
    let raw = match getrandom::fill(&mut buf) {
        Ok(()) => u32::from_ne_bytes(buf),
        Err(_) => std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(1, |d| d.subsec_nanos()),
    };
    ((raw & 0x3FFF_FFFF) | 1) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_ipv4() {
        let socket = bind_udp_socket("127.0.0.1:0".parse().unwrap()).unwrap();
        let local = socket.local_addr().unwrap();
        assert!(local.is_ipv4());
        assert_ne!(local.port(), 0);
    }

    #[tokio::test]
    async fn ephemeral_follows_target_family() {
        let v4 = bind_ephemeral_udp_socket("192.0.2.1:161".parse().unwrap()).unwrap();
        assert!(v4.local_addr().unwrap().is_ipv4());

        // hosts without IPv6 cannot bind [::]
        if let Ok(v6) = bind_ephemeral_udp_socket("[2001:db8::1]:161".parse().unwrap()) {
            assert!(v6.local_addr().unwrap().is_ipv6());
        }
    }

    #[test]
    fn request_ids_are_positive() {
        for _ in 0..100 {
            let id = random_request_id();
            assert!(id > 0);
            assert!(id.checked_add(1000).is_some());
        }
    }
}
