//! Final classification of a credential check.

use std::fmt;

/// Why the device refused the credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    WrongCommunity,
    /// Unknown user, or a failure that cannot be pinned on one key.
    WrongUserOrAuth,
    WrongAuthKey,
    WrongPrivKey,
    UnsupportedSecurityLevel,
}

impl RejectReason {
    pub const ALL: [RejectReason; 5] = [
        Self::WrongCommunity,
        Self::WrongUserOrAuth,
        Self::WrongAuthKey,
        Self::WrongPrivKey,
        Self::UnsupportedSecurityLevel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WrongCommunity => "wrong_community",
            Self::WrongUserOrAuth => "wrong_user_or_auth",
            Self::WrongAuthKey => "wrong_auth_key",
            Self::WrongPrivKey => "wrong_priv_key",
            Self::UnsupportedSecurityLevel => "unsupported_security_level",
        }
    }

    fn message(self) -> &'static str {
        match self {
            Self::WrongCommunity => "community string not accepted",
            Self::WrongUserOrAuth => "unknown user name or wrong authentication settings",
            Self::WrongAuthKey => "wrong authentication key or protocol",
            Self::WrongPrivKey => "wrong privacy key or protocol",
            Self::UnsupportedSecurityLevel => "security level not supported for this user",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RejectReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded = s.to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|reason| reason.as_str() == folded)
            .ok_or_else(|| format!("unknown rejection reason '{s}'"))
    }
}

/// Outcome of one check.
///
/// Serializes as a tagged object:
///
/// ```rust
/// use snmp_credcheck::{RejectReason, ValidationResult};
///
/// let result = ValidationResult::Rejected { reason: RejectReason::WrongPrivKey };
/// assert_eq!(
///     serde_json::to_string(&result).unwrap(),
///     r#"{"outcome":"rejected","reason":"wrong_priv_key"}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ValidationResult {
    /// The device authenticated the request and answered it. `value` is the
    /// rendered binding, which may be `noSuchObject`.
    Accepted { value: String },
    Rejected { reason: RejectReason },
    /// The device could not be reached, or answered with something that is
    /// not a usable SNMP reply.
    Unreachable { detail: String },
    /// Nothing came back within the budget.
    Timeout,
    /// The check was never sent.
    ConfigurationError { detail: String },
}

impl ValidationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// `Some` for rejections.
    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Rejected { reason } => Some(*reason),
            _ => None,
        }
    }

    /// Process exit status for a single check.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Accepted { .. } => 0,
            Self::Rejected { .. } => 1,
            Self::Unreachable { .. } => 2,
            Self::Timeout => 3,
            Self::ConfigurationError { .. } => 4,
        }
    }

    /// Short category name: `accepted`, `rejected`, ...
    pub fn category(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::Rejected { .. } => "rejected",
            Self::Unreachable { .. } => "unreachable",
            Self::Timeout => "timeout",
            Self::ConfigurationError { .. } => "configuration_error",
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted { value } => write!(f, "credentials accepted: {value}"),
            Self::Rejected { reason } => write!(f, "credentials rejected: {}", reason.message()),
            Self::Unreachable { detail } => write!(f, "device unreachable: {detail}"),
            Self::Timeout => f.write_str("no response before timeout; check host, port and firewall"),
            Self::ConfigurationError { detail } => write!(f, "invalid check: {detail}"),
        }
    }
}
