//! Single-request SNMP client.
//!
//! A [`Client`] performs one GET against one agent and reports the outcome
//! as a [`Result`](crate::Result). It is built for credential checks, so the
//! interesting part is how it fails:
//!
//! - no datagram at all within the budget: [`Error::Timeout`]
//! - the agent proved alive but never answered the request:
//!   [`Error::SilentDrop`]
//! - an SNMPv3 report: [`Error::Report`]
//! - a reply that fails local authentication or decryption:
//!   [`Error::Auth`] / [`Error::Decrypt`]
//!
//! The whole call, SNMPv3 discovery included, is bounded by
//! `timeout * (retries + 1)`.

mod auth;
mod v3;

pub use auth::{Auth, MasterKeys, UsmAuth, UsmKeys};

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{Span, instrument};

use crate::error::{Error, Result};
use crate::message::{CommunityMessage, MAX_UDP_PAYLOAD, Message, V3Message};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::transport::{Transport, UdpTransport};
use crate::util::random_request_id;
use crate::v3::SaltCounter;
use crate::varbind::VarBind;

/// Per-request settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Wait per attempt (default: 2 seconds).
    pub timeout: Duration,
    /// Resends after the first attempt (default: 1).
    pub retries: u32,
    /// msgMaxSize advertised in SNMPv3 headers.
    pub max_msg_size: i32,
    /// Send an SNMPv3 discovery next to the first v2c GET, so a host that
    /// discards the community can be told apart from a dead one.
    pub liveness_probe: bool,
    /// SNMPv3 contextName.
    pub context_name: Bytes,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            retries: 1,
            max_msg_size: MAX_UDP_PAYLOAD,
            liveness_probe: true,
            context_name: Bytes::new(),
        }
    }
}

impl ClientConfig {
    /// Upper bound on one call.
    pub fn budget(&self) -> Duration {
        self.timeout.saturating_mul(self.retries.saturating_add(1))
    }
}

/// `start + wait`, clamped to a far-future instant instead of overflowing.
fn deadline_after(start: Instant, wait: Duration) -> Instant {
    start
        .checked_add(wait)
        .unwrap_or_else(|| start + Duration::from_secs(86400 * 365 * 30))
}

/// What a datagram handler decided.
pub(crate) enum Step<R> {
    /// Not ours; keep listening.
    Ignore,
    /// Finished, successfully or not.
    Done(Result<R>),
    /// Send this instead and keep listening.
    Resend(Bytes),
}

/// How an exchange ended when no handler finished it.
struct Exhausted {
    malformed: bool,
    elapsed: Duration,
}

pub struct Client<T: Transport = UdpTransport> {
    transport: T,
    config: ClientConfig,
    next_id: AtomicI32,
    salt: Arc<SaltCounter>,
}

impl Client<UdpTransport> {
    /// Open a UDP socket to `target`.
    pub async fn connect(target: SocketAddr, config: ClientConfig, salt: Arc<SaltCounter>) -> Result<Self> {
        let transport = UdpTransport::connect(target).await?;
        Ok(Self::new(transport, config, salt))
    }
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, config: ClientConfig, salt: Arc<SaltCounter>) -> Self {
        Self {
            transport,
            config,
            next_id: AtomicI32::new(random_request_id()),
            salt,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.transport.peer_addr()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn next_request_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// GET a single OID.
    #[instrument(
        level = "debug",
        skip(self, auth),
        fields(snmp.target = %self.peer_addr(), snmp.oid = %oid)
    )]
    pub async fn get(&self, auth: &Auth, oid: &Oid) -> Result<VarBind> {
        let deadline = deadline_after(Instant::now(), self.config.budget());
        match auth {
            Auth::Community(community) => self.get_v2c(community, oid, deadline).await,
            Auth::Usm(usm) => self.get_v3(usm, oid, deadline).await,
        }
    }

    async fn get_v2c(&self, community: &Bytes, oid: &Oid, deadline: Instant) -> Result<VarBind> {
        let request_id = self.next_request_id();
        let request = CommunityMessage::v2c(
            community.clone(),
            Pdu::get_request(request_id, std::slice::from_ref(oid)),
        )
        .encode();

        let probe_id = self.config.liveness_probe.then(|| self.next_request_id());
        let companion = probe_id.map(|id| V3Message::discovery_request(id).encode());
        let mut alive = false;

        tracing::debug!(target: "snmp_credcheck::client", { snmp.request_id = request_id, snmp.probe_id = ?probe_id }, "sending v2c GET");

        let outcome = self
            .exchange(request, companion, deadline, |_, message| match message {
                Message::Community(msg) if msg.pdu.request_id == request_id => {
                    Step::Done(self.finish_get(msg.into_pdu()))
                }
                Message::V3(msg) if Some(msg.msg_id()) == probe_id => {
                    tracing::debug!(target: "snmp_credcheck::client", { snmp.msg_id = msg.msg_id() }, "liveness probe answered");
                    alive = true;
                    Step::Ignore
                }
                _ => Step::Ignore,
            })
            .await?;

        match outcome {
            Ok(varbind) => Ok(varbind),
            Err(exhausted) if alive => Err(Error::SilentDrop {
                target: self.peer_addr(),
                elapsed: exhausted.elapsed,
            }
            .boxed()),
            Err(exhausted) => Err(self.exhausted_error(exhausted)),
        }
    }

    /// Send `request` until a handler finishes or the deadline passes.
    ///
    /// `companion` goes out once, right after the first send. Each attempt
    /// waits `config.timeout`, cut short by `deadline`. The handler sees the
    /// raw datagram and its decoding; datagrams that do not decode are
    /// skipped but remembered.
    #[instrument(
        level = "debug",
        skip_all,
        fields(
            snmp.target = %self.peer_addr(),
            snmp.attempt = tracing::field::Empty,
            snmp.elapsed_ms = tracing::field::Empty,
        )
    )]
    async fn exchange<R>(
        &self,
        mut request: Bytes,
        companion: Option<Bytes>,
        deadline: Instant,
        mut handle: impl FnMut(&[u8], Message) -> Step<R>,
    ) -> Result<std::result::Result<R, Exhausted>> {
        let start = Instant::now();
        let target = self.peer_addr();
        let mut malformed = false;

        for attempt in 0..=self.config.retries {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            Span::current().record("snmp.attempt", attempt);
            if attempt > 0 {
                tracing::debug!(target: "snmp_credcheck::client", "retrying request");
            }

            self.transport.send(&request).await?;
            if attempt == 0
                && let Some(extra) = &companion
            {
                self.transport.send(extra).await?;
            }

            let mut attempt_deadline = deadline_after(now, self.config.timeout).min(deadline);
            while let Some(datagram) = self.transport.recv(attempt_deadline).await? {
                let message = match Message::decode(datagram.clone(), target) {
                    Ok(message) => message,
                    Err(_) => {
                        malformed = true;
                        continue;
                    }
                };
                match handle(&datagram, message) {
                    Step::Ignore => {
                        tracing::trace!(target: "snmp_credcheck::client", "ignoring unrelated datagram");
                    }
                    Step::Done(result) => {
                        Span::current().record("snmp.elapsed_ms", start.elapsed().as_millis() as u64);
                        return result.map(Ok);
                    }
                    Step::Resend(data) => {
                        request = data;
                        self.transport.send(&request).await?;
                        attempt_deadline = deadline_after(Instant::now(), self.config.timeout).min(deadline);
                    }
                }
            }
        }

        let elapsed = start.elapsed();
        Span::current().record("snmp.elapsed_ms", elapsed.as_millis() as u64);
        tracing::debug!(target: "snmp_credcheck::client", { snmp.target = %target, ?elapsed, malformed }, "no answer within budget");
        Ok(Err(Exhausted { malformed, elapsed }))
    }

    fn exhausted_error(&self, exhausted: Exhausted) -> Box<Error> {
        let target = self.peer_addr();
        if exhausted.malformed {
            Error::MalformedResponse { target }.boxed()
        } else {
            Error::Timeout {
                target,
                elapsed: exhausted.elapsed,
                retries: self.config.retries,
            }
            .boxed()
        }
    }

    /// Turn a Response PDU into the single requested binding.
    fn finish_get(&self, pdu: Pdu) -> Result<VarBind> {
        let target = self.peer_addr();
        if pdu.pdu_type != PduType::Response {
            tracing::debug!(target: "snmp_credcheck::client", { snmp.pdu_type = %pdu.pdu_type }, "unexpected PDU type in reply");
            return Err(Error::MalformedResponse { target }.boxed());
        }
        if pdu.is_error() {
            return Err(Error::Snmp {
                target,
                status: pdu.error_status_enum(),
                index: pdu.error_index.max(0) as u32,
                oid: pdu.error_oid(),
            }
            .boxed());
        }
        pdu.varbinds
            .into_iter()
            .next()
            .ok_or_else(|| Error::MalformedResponse { target }.boxed())
    }
}
