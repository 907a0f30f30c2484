//! Credential descriptions and their validation.
//!
//! A [`CredentialSpec`] is what a caller wants checked. It is free-form on
//! purpose: the security level is stated separately from the protocols and
//! keys, so a spec can disagree with itself. [`CredentialSpec::validate`]
//! checks that it does not and produces a [`ValidatedSpec`], the only thing
//! a probe will put on the wire.
//!
//! ```rust
//! use snmp_credcheck::{AuthProtocol, CredentialSpec, PrivProtocol, SecurityLevel, UsmCredentials};
//!
//! let spec = CredentialSpec::v3(
//!     "192.0.2.1",
//!     UsmCredentials::new("admin")
//!         .auth(AuthProtocol::Sha256, "authpassword")
//!         .privacy(PrivProtocol::Aes128, "privpassword"),
//! );
//! let validated = spec.validate().unwrap();
//! assert_eq!(validated.security_level(), Some(SecurityLevel::AuthPriv));
//!
//! let broken = CredentialSpec::v3(
//!     "192.0.2.1",
//!     UsmCredentials::new("admin").security_level(SecurityLevel::AuthPriv),
//! );
//! assert!(broken.validate().is_err());
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::client::Auth;
use crate::message::SecurityLevel;
use crate::oid::Oid;
use crate::v3::{AuthProtocol, KeyExtension, PrivProtocol};

/// sysDescr.0
pub const DEFAULT_OID: &str = "1.3.6.1.2.1.1.1.0";
pub const DEFAULT_PORT: u16 = 161;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_RETRIES: u32 = 1;

/// Longest USM user name (SnmpAdminString (SIZE(1..32)), RFC 3414).
pub const MAX_USERNAME_LEN: usize = 32;

/// Protocol version of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnmpVersion {
    V2c,
    V3,
}

impl fmt::Display for SnmpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::V2c => "2c",
            Self::V3 => "3",
        })
    }
}

impl FromStr for SnmpVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().trim_start_matches('v') {
            "2c" | "2" => Ok(Self::V2c),
            "3" => Ok(Self::V3),
            _ => Err(format!("unsupported SNMP version '{s}'; expected 2c or 3")),
        }
    }
}

impl serde::Serialize for SnmpVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Accepts `2c`, `v3` and bare numbers, since YAML reads `version: 3` as
/// an integer.
impl<'de> serde::Deserialize<'de> for SnmpVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }
        let text = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => n.to_string(),
            Raw::Text(text) => text,
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// One credential check, as requested.
#[derive(Debug, Clone)]
pub struct CredentialSpec {
    /// Host name or IP literal.
    pub host: String,
    pub port: u16,
    /// Wait per attempt.
    pub timeout: Duration,
    /// Resends after the first attempt.
    pub retries: u32,
    /// Dotted OID (or a system-group name such as `sysName.0`) to GET.
    pub oid: String,
    pub credentials: Credentials,
}

/// Version-specific secrets.
#[derive(Clone)]
pub enum Credentials {
    /// SNMPv2c community. The empty string is a credential of its own.
    Community(String),
    Usm(UsmCredentials),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Community(_) => f.write_str("Community([REDACTED])"),
            Self::Usm(usm) => usm.fmt(f),
        }
    }
}

/// SNMPv3 USM tuple.
#[derive(Clone)]
pub struct UsmCredentials {
    pub username: String,
    pub security_level: SecurityLevel,
    pub auth_protocol: Option<AuthProtocol>,
    pub auth_key: String,
    pub priv_protocol: Option<PrivProtocol>,
    pub priv_key: String,
    /// `None` picks the privacy protocol's usual extension.
    pub key_extension: Option<KeyExtension>,
}

impl UsmCredentials {
    /// noAuthNoPriv user.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            security_level: SecurityLevel::NoAuthNoPriv,
            auth_protocol: None,
            auth_key: String::new(),
            priv_protocol: None,
            priv_key: String::new(),
            key_extension: None,
        }
    }

    /// Set authentication and raise the level to at least authNoPriv.
    pub fn auth(mut self, protocol: AuthProtocol, key: impl Into<String>) -> Self {
        self.auth_protocol = Some(protocol);
        self.auth_key = key.into();
        self.security_level = self.security_level.max(SecurityLevel::AuthNoPriv);
        self
    }

    /// Set privacy and raise the level to authPriv.
    pub fn privacy(mut self, protocol: PrivProtocol, key: impl Into<String>) -> Self {
        self.priv_protocol = Some(protocol);
        self.priv_key = key.into();
        self.security_level = SecurityLevel::AuthPriv;
        self
    }

    pub fn key_extension(mut self, extension: KeyExtension) -> Self {
        self.key_extension = Some(extension);
        self
    }

    /// Override the level without touching protocols or keys.
    pub fn security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }

    /// Level implied by which keys are present: a privacy key means
    /// authPriv, an authentication key authNoPriv.
    pub fn inferred_level(&self) -> SecurityLevel {
        if !self.priv_key.is_empty() {
            SecurityLevel::AuthPriv
        } else if !self.auth_key.is_empty() {
            SecurityLevel::AuthNoPriv
        } else {
            SecurityLevel::NoAuthNoPriv
        }
    }

    fn check(&self) -> Result<(), SpecError> {
        let len = self.username.len();
        if len == 0 || len > MAX_USERNAME_LEN {
            return Err(SpecError::UsernameLength { len });
        }

        let level = self.security_level;
        if level.requires_auth() {
            if self.auth_protocol.is_none() {
                return Err(SpecError::MissingAuthProtocol { level });
            }
            if self.auth_key.is_empty() {
                return Err(SpecError::MissingAuthKey { level });
            }
        } else if self.auth_protocol.is_some() || !self.auth_key.is_empty() {
            return Err(SpecError::UnexpectedAuth { level });
        }

        if level.requires_priv() {
            if self.priv_protocol.is_none() {
                return Err(SpecError::MissingPrivProtocol { level });
            }
            if self.priv_key.is_empty() {
                return Err(SpecError::MissingPrivKey { level });
            }
        } else if self.priv_protocol.is_some() || !self.priv_key.is_empty() {
            return Err(SpecError::UnexpectedPriv { level });
        }

        if let (Some(auth), Some(privacy)) = (self.auth_protocol, self.priv_protocol)
            && self.key_extension == Some(KeyExtension::None)
            && !auth.is_compatible_with(privacy)
        {
            return Err(SpecError::KeyTooShort { auth, privacy });
        }
        Ok(())
    }

    fn to_auth(&self) -> Auth {
        let mut usm = Auth::usm(self.username.clone());
        if let (true, Some(protocol)) = (self.security_level.requires_auth(), self.auth_protocol) {
            usm = usm.auth(protocol, &self.auth_key);
        }
        if let (true, Some(protocol)) = (self.security_level.requires_priv(), self.priv_protocol) {
            let extension = self
                .key_extension
                .unwrap_or_else(|| protocol.default_key_extension());
            usm = usm.privacy_with_extension(protocol, &self.priv_key, extension);
        }
        usm.into()
    }
}

impl fmt::Debug for UsmCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsmCredentials")
            .field("username", &self.username)
            .field("security_level", &self.security_level)
            .field("auth_protocol", &self.auth_protocol)
            .field("priv_protocol", &self.priv_protocol)
            .field("key_extension", &self.key_extension)
            .finish_non_exhaustive()
    }
}

/// Longest total budget a spec may ask for.
pub const MAX_BUDGET: Duration = Duration::from_secs(24 * 60 * 60);

/// Why a spec cannot be probed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SpecError {
    #[error("target host is empty")]
    EmptyHost,
    #[error("target port must not be 0")]
    ZeroPort,
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
    #[error("timeout x (retries + 1) must not exceed {max:?}, got {budget:?}")]
    BudgetTooLong { budget: Duration, max: Duration },
    #[error("invalid OID '{oid}'")]
    InvalidOid { oid: String },
    #[error("USM user name must be 1 to 32 bytes, got {len}")]
    UsernameLength { len: usize },
    #[error("{level} requires an authentication protocol")]
    MissingAuthProtocol { level: SecurityLevel },
    #[error("{level} requires an authentication key")]
    MissingAuthKey { level: SecurityLevel },
    #[error("{level} does not use authentication, but an auth protocol or key was given")]
    UnexpectedAuth { level: SecurityLevel },
    #[error("{level} requires a privacy protocol")]
    MissingPrivProtocol { level: SecurityLevel },
    #[error("{level} requires a privacy key")]
    MissingPrivKey { level: SecurityLevel },
    #[error("{level} does not use privacy, but a priv protocol or key was given")]
    UnexpectedPriv { level: SecurityLevel },
    #[error("{auth} keys are too short for {privacy} without key extension")]
    KeyTooShort {
        auth: AuthProtocol,
        privacy: PrivProtocol,
    },
}

impl CredentialSpec {
    /// SNMPv2c check with default port, timeout, retries and OID.
    pub fn v2c(host: impl Into<String>, community: impl Into<String>) -> Self {
        Self::new(host, Credentials::Community(community.into()))
    }

    /// SNMPv3 check with default port, timeout, retries and OID.
    pub fn v3(host: impl Into<String>, usm: UsmCredentials) -> Self {
        Self::new(host, Credentials::Usm(usm))
    }

    pub fn new(host: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            oid: DEFAULT_OID.to_string(),
            credentials,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn oid(mut self, oid: impl Into<String>) -> Self {
        self.oid = oid.into();
        self
    }

    pub fn version(&self) -> SnmpVersion {
        match self.credentials {
            Credentials::Community(_) => SnmpVersion::V2c,
            Credentials::Usm(_) => SnmpVersion::V3,
        }
    }

    /// Upper bound on one probe: `timeout * (retries + 1)`.
    pub fn budget(&self) -> Duration {
        self.timeout.saturating_mul(self.retries.saturating_add(1))
    }

    /// Check the spec against itself. Performs no I/O.
    pub fn validate(&self) -> Result<ValidatedSpec, SpecError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(SpecError::EmptyHost);
        }
        if self.port == 0 {
            return Err(SpecError::ZeroPort);
        }
        if self.timeout.is_zero() {
            return Err(SpecError::ZeroTimeout);
        }
        if self.budget() > MAX_BUDGET {
            return Err(SpecError::BudgetTooLong {
                budget: self.budget(),
                max: MAX_BUDGET,
            });
        }
        let oid = Oid::parse(&self.oid).map_err(|_| SpecError::InvalidOid {
            oid: self.oid.clone(),
        })?;

        let (auth, security_level) = match &self.credentials {
            Credentials::Community(community) => (Auth::v2c(community.clone()), None),
            Credentials::Usm(usm) => {
                usm.check()?;
                (usm.to_auth(), Some(usm.security_level))
            }
        };

        Ok(ValidatedSpec {
            host: host.trim_start_matches('[').trim_end_matches(']').into(),
            port: self.port,
            timeout: self.timeout,
            retries: self.retries,
            oid,
            version: self.version(),
            security_level,
            auth,
        })
    }
}

/// A spec whose invariants hold. Only [`CredentialSpec::validate`] builds one.
#[derive(Debug, Clone)]
pub struct ValidatedSpec {
    host: Box<str>,
    port: u16,
    timeout: Duration,
    retries: u32,
    oid: Oid,
    version: SnmpVersion,
    security_level: Option<SecurityLevel>,
    auth: Auth,
}

impl ValidatedSpec {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn budget(&self) -> Duration {
        self.timeout.saturating_mul(self.retries.saturating_add(1))
    }

    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    pub fn version(&self) -> SnmpVersion {
        self.version
    }

    /// `None` for SNMPv2c.
    pub fn security_level(&self) -> Option<SecurityLevel> {
        self.security_level
    }

    /// What the client presents on the wire.
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn target(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
