//! Standard test fixtures.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use snmp_credcheck::{
    CredentialSpec, CredentialValidator, EngineConfig, Oid, ValidatorConfig, Value, oid,
};
use tokio::net::UdpSocket;

pub const COMMUNITY: &str = "public";
pub const AUTH_PASS: &str = "authpassword123";
pub const PRIV_PASS: &str = "privpassword123";
pub const SYS_DESCR: &str = "Test SNMP Agent";

/// Engine ID the test agent reports during discovery.
pub const ENGINE_ID: &[u8] = b"\x80\x00\x1f\x88\x04credcheck-test";

/// System group entries (1.3.6.1.2.1.1).
pub fn system_mib() -> BTreeMap<Oid, Value> {
    let mut data = BTreeMap::new();
    data.insert(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from(SYS_DESCR));
    data.insert(
        oid!(1, 3, 6, 1, 2, 1, 1, 2, 0),
        Value::ObjectIdentifier(oid!(1, 3, 6, 1, 4, 1, 99999)),
    );
    data.insert(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(123456));
    data.insert(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("test-agent"));
    data
}

/// Short per-attempt timeout so negative cases finish quickly.
pub fn fast(spec: CredentialSpec) -> CredentialSpec {
    spec.timeout(Duration::from_millis(500)).retries(1)
}

/// UDP validator with default settings.
pub fn validator() -> CredentialValidator {
    CredentialValidator::udp(EngineConfig::default(), ValidatorConfig::default())
}

/// A localhost port with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.local_addr().unwrap()
}

/// A bound socket that never reads. Keep it alive for the duration of the
/// test.
pub async fn silent_socket() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}
