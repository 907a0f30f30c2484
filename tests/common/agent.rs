//! In-process SNMP agent for testing.
//!
//! Answers v2c GETs for one community and v3 GETs for a set of USM users,
//! with real HMAC and privacy processing. Refusals look the way net-snmp
//! sends them: wrong communities are dropped silently, USM failures become
//! unauthenticated Report PDUs. Agents bind to ephemeral localhost ports and
//! shut down on drop.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use snmp_credcheck::ber::Decoder;
use snmp_credcheck::message::{
    CommunityMessage, Message, MsgFlags, MsgGlobalData, ScopedPdu, V3Message, V3MessageData,
};
use snmp_credcheck::pdu::Pdu;
use snmp_credcheck::v3::{
    AuthProtocol, LocalizedKey, PrivKey, PrivProtocol, SaltCounter, UsmSecurityParams,
    authenticate_message, report_oid, verify_message,
};
use snmp_credcheck::{ErrorStatus, Oid, SecurityLevel, Value, VarBind};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::fixtures::{COMMUNITY, ENGINE_ID, system_mib};

const ENGINE_BOOTS: u32 = 7;
const ENGINE_TIME: u32 = 4_000;
const MSG_MAX_SIZE: i32 = 65507;

// usmStats counters (RFC 3414 5)
const UNSUPPORTED_SEC_LEVELS: u32 = 1;
const UNKNOWN_USER_NAMES: u32 = 3;
const UNKNOWN_ENGINE_IDS: u32 = 4;
const WRONG_DIGESTS: u32 = 5;
const DECRYPTION_ERRORS: u32 = 6;

/// A USM user known to the test agent.
#[derive(Clone)]
pub struct V3User {
    pub name: Vec<u8>,
    pub auth: Option<(AuthProtocol, Vec<u8>)>,
    pub privacy: Option<(PrivProtocol, Vec<u8>)>,
}

impl V3User {
    pub fn no_auth(name: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            auth: None,
            privacy: None,
        }
    }

    pub fn auth_only(name: impl Into<Vec<u8>>, protocol: AuthProtocol, password: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            auth: Some((protocol, password.into())),
            privacy: None,
        }
    }

    pub fn auth_priv(
        name: impl Into<Vec<u8>>,
        auth_protocol: AuthProtocol,
        auth_password: impl Into<Vec<u8>>,
        priv_protocol: PrivProtocol,
        priv_password: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            auth: Some((auth_protocol, auth_password.into())),
            privacy: Some((priv_protocol, priv_password.into())),
        }
    }

    fn level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (None, _) => SecurityLevel::NoAuthNoPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
        }
    }

    fn localize(&self) -> LocalUser {
        let auth = self
            .auth
            .as_ref()
            .map(|(protocol, password)| LocalizedKey::from_password(*protocol, password, ENGINE_ID));
        let privacy = match (&self.auth, &self.privacy) {
            (Some((auth_protocol, _)), Some((protocol, password))) => Some(
                PrivKey::from_password(
                    *auth_protocol,
                    *protocol,
                    password,
                    ENGINE_ID,
                    protocol.default_key_extension(),
                )
                .expect("test user has usable privacy key"),
            ),
            _ => None,
        };
        LocalUser {
            level: self.level(),
            auth,
            privacy,
        }
    }
}

struct LocalUser {
    level: SecurityLevel,
    auth: Option<LocalizedKey>,
    privacy: Option<PrivKey>,
}

/// Builder for agents with non-default configuration.
pub struct TestAgentBuilder {
    community: Option<String>,
    denied_community: Option<String>,
    users: Vec<V3User>,
    data: BTreeMap<Oid, Value>,
    v3: bool,
}

impl TestAgentBuilder {
    pub fn new() -> Self {
        Self {
            community: Some(COMMUNITY.to_string()),
            denied_community: None,
            users: Vec::new(),
            data: system_mib(),
            v3: true,
        }
    }

    pub fn community(mut self, community: impl Into<String>) -> Self {
        self.community = Some(community.into());
        self
    }

    /// Community that is recognised but answered with authorizationError.
    pub fn denied_community(mut self, community: impl Into<String>) -> Self {
        self.denied_community = Some(community.into());
        self
    }

    pub fn usm_user(mut self, user: V3User) -> Self {
        self.users.push(user);
        self
    }

    pub fn data(mut self, data: BTreeMap<Oid, Value>) -> Self {
        self.data = data;
        self
    }

    /// Ignore every SNMPv3 message, discovery included.
    pub fn without_v3(mut self) -> Self {
        self.v3 = false;
        self
    }

    pub async fn build(self) -> TestAgent {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind test agent");
        let addr = socket.local_addr().expect("test agent address");
        let received = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let users = self
            .users
            .iter()
            .map(|user| (user.name.clone(), user.localize()))
            .collect();
        let state = AgentState {
            community: self.community,
            denied_community: self.denied_community,
            users,
            data: self.data,
            v3: self.v3,
            salt: SaltCounter::new(),
        };

        let task = tokio::spawn(serve(socket, state, received.clone(), cancel.clone()));

        TestAgent {
            addr,
            received,
            cancel,
            _task: task,
        }
    }
}

impl Default for TestAgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-process SNMP agent for testing.
///
/// ```ignore
/// let agent = TestAgent::new().await;
/// let spec = CredentialSpec::v2c("127.0.0.1", "public").port(agent.port());
/// assert!(validator().validate(&spec).await.is_accepted());
/// ```
pub struct TestAgent {
    addr: SocketAddr,
    received: Arc<AtomicUsize>,
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

impl TestAgent {
    /// v2c agent for [`COMMUNITY`] with the system MIB and no USM users.
    pub async fn new() -> Self {
        TestAgentBuilder::new().build().await
    }

    pub fn builder() -> TestAgentBuilder {
        TestAgentBuilder::new()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Datagrams received so far.
    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TestAgent {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct AgentState {
    community: Option<String>,
    denied_community: Option<String>,
    users: BTreeMap<Vec<u8>, LocalUser>,
    data: BTreeMap<Oid, Value>,
    v3: bool,
    salt: SaltCounter,
}

async fn serve(
    socket: UdpSocket,
    state: AgentState,
    received: Arc<AtomicUsize>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; 65535];
    loop {
        let (len, peer) = tokio::select! {
            _ = cancel.cancelled() => return,
            result = socket.recv_from(&mut buf) => match result {
                Ok(pair) => pair,
                Err(_) => continue,
            },
        };
        received.fetch_add(1, Ordering::SeqCst);
        let data = Bytes::copy_from_slice(&buf[..len]);
        if let Some(reply) = state.handle(data, peer) {
            let _ = socket.send_to(&reply, peer).await;
        }
    }
}

impl AgentState {
    fn handle(&self, data: Bytes, peer: SocketAddr) -> Option<Bytes> {
        match Message::decode(data.clone(), peer).ok()? {
            Message::Community(msg) => self.handle_community(msg),
            Message::V3(msg) if self.v3 => self.handle_v3(&data, msg, peer),
            Message::V3(_) => None,
        }
    }

    fn lookup(&self, request: &Pdu) -> Pdu {
        let varbinds = request
            .varbinds
            .iter()
            .map(|vb| {
                let value = self.data.get(&vb.oid).cloned().unwrap_or(Value::NoSuchObject);
                VarBind::new(vb.oid.clone(), value)
            })
            .collect();
        Pdu::response(request.request_id, varbinds)
    }

    fn handle_community(&self, msg: CommunityMessage) -> Option<Bytes> {
        let community = String::from_utf8_lossy(&msg.community).into_owned();
        let pdu = if Some(&community) == self.denied_community.as_ref() {
            msg.pdu.to_error_response(ErrorStatus::AuthorizationError, 0)
        } else if Some(&community) == self.community.as_ref() {
            self.lookup(&msg.pdu)
        } else {
            return None;
        };
        Some(CommunityMessage::v2c(msg.community.clone(), pdu).encode())
    }

    fn handle_v3(&self, raw: &[u8], msg: V3Message, peer: SocketAddr) -> Option<Bytes> {
        let params = UsmSecurityParams::decode(msg.security_params.clone(), peer).ok()?;
        if params.engine_id.is_empty() {
            return Some(report(&msg, UNKNOWN_ENGINE_IDS));
        }
        let Some(user) = self.users.get(&params.username[..]) else {
            return Some(report(&msg, UNKNOWN_USER_NAMES));
        };

        let level = msg.security_level();
        if level > user.level {
            return Some(report(&msg, UNSUPPORTED_SEC_LEVELS));
        }
        if level.requires_auth() {
            let key = user.auth.as_ref()?;
            let verified = UsmSecurityParams::find_auth_params_offset(raw)
                .is_some_and(|(offset, len)| verify_message(key, raw, offset, len));
            if !verified {
                return Some(report(&msg, WRONG_DIGESTS));
            }
        }

        let scoped = match &msg.data {
            V3MessageData::Plaintext(scoped) => scoped.clone(),
            V3MessageData::Encrypted(ciphertext) => {
                let key = user.privacy.as_ref()?;
                let opened = key
                    .decrypt(ciphertext, params.engine_boots, params.engine_time, &params.priv_params, peer)
                    .ok()
                    .and_then(|plain| ScopedPdu::decode(&mut Decoder::new(plain)).ok());
                match opened {
                    Some(scoped) => scoped,
                    None => return Some(report(&msg, DECRYPTION_ERRORS)),
                }
            }
        };

        // VACM: users may only be read at their configured level
        let response = if level < user.level {
            scoped.pdu.to_error_response(ErrorStatus::AuthorizationError, 0)
        } else {
            self.lookup(&scoped.pdu)
        };
        Some(self.encode_reply(&msg, user, level, &params.username, response))
    }

    fn encode_reply(
        &self,
        request: &V3Message,
        user: &LocalUser,
        level: SecurityLevel,
        username: &Bytes,
        response: Pdu,
    ) -> Bytes {
        let scoped = ScopedPdu::new(ENGINE_ID, "", response);
        let mut params = UsmSecurityParams::new(ENGINE_ID, ENGINE_BOOTS, ENGINE_TIME, username.clone());
        let header = MsgGlobalData::new(request.msg_id(), MSG_MAX_SIZE, MsgFlags::new(level, false));

        let message = match (&user.privacy, level.requires_priv()) {
            (Some(key), true) => {
                let (ciphertext, salt) = key
                    .encrypt(&scoped.encode_to_bytes(), ENGINE_BOOTS, ENGINE_TIME, &self.salt)
                    .expect("encrypt reply");
                params = params.with_priv_params(salt);
                if let Some(auth) = &user.auth {
                    params = params.with_auth_placeholder(auth.mac_len());
                }
                V3Message::new_encrypted(header, params.encode(), ciphertext)
            }
            _ => {
                if let (Some(auth), true) = (&user.auth, level.requires_auth()) {
                    params = params.with_auth_placeholder(auth.mac_len());
                }
                V3Message::new(header, params.encode(), scoped)
            }
        };

        let mut encoded = message.encode().to_vec();
        if let (Some(key), true) = (&user.auth, level.requires_auth()) {
            let (offset, _) = UsmSecurityParams::find_auth_params_offset(&encoded).expect("auth placeholder");
            authenticate_message(key, &mut encoded, offset);
        }
        Bytes::from(encoded)
    }
}

/// Unauthenticated usmStats report for `request`.
fn report(request: &V3Message, counter: u32) -> Bytes {
    let params = UsmSecurityParams::new(ENGINE_ID, ENGINE_BOOTS, ENGINE_TIME, "");
    let header = MsgGlobalData::new(
        request.msg_id(),
        MSG_MAX_SIZE,
        MsgFlags::new(SecurityLevel::NoAuthNoPriv, false),
    );
    let pdu = Pdu::report(request.msg_id(), report_oid(counter), 1);
    V3Message::new(header, params.encode(), ScopedPdu::new(ENGINE_ID, "", pdu)).encode()
}
