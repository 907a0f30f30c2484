//! The SNMP engine seam.
//!
//! The probe talks to an [`SnmpEngine`], which performs one GET and reports
//! what happened as an [`EngineSignal`]. [`UdpEngine`] is the bundled
//! implementation on top of [`Client`]; tests substitute fakes.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::instrument;

use crate::client::{Client, ClientConfig};
use crate::credential::ValidatedSpec;
use crate::error::Error;
use crate::message::MAX_UDP_PAYLOAD;
use crate::v3::{ReportKind, SaltCounter};

/// Raw outcome of one engine call, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineSignal {
    /// The GET was answered. `value` is the rendered binding.
    Success { value: String },
    /// Socket or name-resolution failure.
    Transport { detail: String },
    /// The agent (or the local USM check) refused the request.
    Security { hint: SecurityHint, detail: String },
    /// The agent answered with something unusable.
    Protocol { detail: String },
    /// Nothing came back.
    Timeout { elapsed: Duration },
    /// Anything else.
    Unrecognized { detail: String },
}

/// What kind of security refusal an [`EngineSignal::Security`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityHint {
    /// The agent answered a liveness probe or discovery but discarded the
    /// request itself.
    SilentDrop,
    /// authorizationError or noAccess.
    AccessDenied,
    /// usmStatsUnknownUserNames.
    UnknownUser,
    /// usmStatsWrongDigests.
    WrongDigest,
    /// usmStatsDecryptionErrors, or a reply we could not decrypt.
    Decryption,
    /// usmStatsUnsupportedSecLevels.
    UnsupportedLevel,
    /// A reply failed the local HMAC check.
    UnverifiedResponse,
    Generic,
}

impl EngineSignal {
    /// Map a client error onto a signal.
    pub fn from_error(error: &Error) -> Self {
        let detail = error.to_string();
        let security = |hint| EngineSignal::Security {
            hint,
            detail: detail.clone(),
        };
        match error {
            Error::Network { .. } | Error::Resolve { .. } => EngineSignal::Transport { detail },
            Error::Timeout { elapsed, .. } => EngineSignal::Timeout { elapsed: *elapsed },
            Error::SilentDrop { .. } => security(SecurityHint::SilentDrop),
            Error::Snmp { status, .. } if status.is_access_denied() => {
                security(SecurityHint::AccessDenied)
            }
            Error::Snmp { status, index, .. } => EngineSignal::Protocol {
                detail: format!("agent answered with error status {status} at index {index}"),
            },
            Error::Report { kind, .. } => match kind {
                ReportKind::UnknownUserName => security(SecurityHint::UnknownUser),
                ReportKind::WrongDigest => security(SecurityHint::WrongDigest),
                ReportKind::DecryptionError => security(SecurityHint::Decryption),
                ReportKind::UnsupportedSecLevel => security(SecurityHint::UnsupportedLevel),
                ReportKind::NotInTimeWindow | ReportKind::UnknownEngineId => {
                    EngineSignal::Unrecognized { detail }
                }
                ReportKind::Other(_) => security(SecurityHint::Generic),
            },
            Error::Auth { .. } => security(SecurityHint::UnverifiedResponse),
            Error::Decrypt { .. } => security(SecurityHint::Decryption),
            Error::MalformedResponse { .. } => EngineSignal::Protocol { detail },
            _ => EngineSignal::Unrecognized { detail },
        }
    }

    /// Short name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Transport { .. } => "transport",
            Self::Security { .. } => "security",
            Self::Protocol { .. } => "protocol",
            Self::Timeout { .. } => "timeout",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }
}

/// Something that can GET one OID with the credentials of a spec.
///
/// Implementations must not panic on ordinary failures and should finish
/// within [`ValidatedSpec::budget`]; callers enforce that bound anyway.
pub trait SnmpEngine: Send + Sync {
    fn get(&self, spec: &ValidatedSpec) -> impl Future<Output = EngineSignal> + Send;
}

impl<E: SnmpEngine> SnmpEngine for Arc<E> {
    fn get(&self, spec: &ValidatedSpec) -> impl Future<Output = EngineSignal> + Send {
        (**self).get(spec)
    }
}

/// Engine-wide settings; per-check settings live on the spec.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// msgMaxSize advertised in SNMPv3 headers.
    pub max_msg_size: i32,
    /// Send a v3 discovery next to each v2c GET (see [`ClientConfig`]).
    pub liveness_probe: bool,
    /// SNMPv3 contextName.
    pub context_name: Bytes,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_msg_size: MAX_UDP_PAYLOAD,
            liveness_probe: true,
            context_name: Bytes::new(),
        }
    }
}

/// Engine using one fresh UDP socket per call.
#[derive(Debug, Clone, Default)]
pub struct UdpEngine {
    config: EngineConfig,
    salt: Arc<SaltCounter>,
}

impl UdpEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            salt: Arc::new(SaltCounter::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn client_config(&self, spec: &ValidatedSpec) -> ClientConfig {
        ClientConfig {
            timeout: spec.timeout(),
            retries: spec.retries(),
            max_msg_size: self.config.max_msg_size,
            liveness_probe: self.config.liveness_probe,
            context_name: self.config.context_name.clone(),
        }
    }

    async fn run(&self, spec: &ValidatedSpec) -> crate::Result<String> {
        let target = resolve(spec.host(), spec.port()).await?;
        let client = Client::connect(target, self.client_config(spec), self.salt.clone()).await?;
        let varbind = client.get(spec.auth(), spec.oid()).await?;
        Ok(varbind.value.to_string())
    }
}

impl SnmpEngine for UdpEngine {
    #[instrument(
        level = "debug",
        skip_all,
        fields(snmp.target = %spec.target(), snmp.version = %spec.version())
    )]
    async fn get(&self, spec: &ValidatedSpec) -> EngineSignal {
        let signal = match self.run(spec).await {
            Ok(value) => EngineSignal::Success { value },
            Err(e) => EngineSignal::from_error(&e),
        };
        tracing::debug!(target: "snmp_credcheck::engine", { signal = signal.kind() }, "engine call finished");
        signal
    }
}

/// Resolve `host` to the first address, preferring a literal.
async fn resolve(host: &str, port: u16) -> crate::Result<SocketAddr> {
    if let Ok(ip) = host.parse() {
        return Ok(SocketAddr::new(ip, port));
    }
    let resolve_error = |reason: String| {
        tracing::debug!(target: "snmp_credcheck::engine", { host, %reason }, "name resolution failed");
        Error::Resolve {
            host: host.into(),
            reason: reason.into(),
        }
        .boxed()
    };
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| resolve_error(e.to_string()))?;
    addrs
        .next()
        .ok_or_else(|| resolve_error("no addresses".to_string()))
}
