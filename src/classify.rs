//! Engine signals to validation results.

use crate::credential::SnmpVersion;
use crate::engine::{EngineSignal, SecurityHint};
use crate::message::SecurityLevel;
use crate::outcome::{RejectReason, ValidationResult};

/// Pure mapping from `(version, level, signal)` to a [`ValidationResult`].
///
/// Where a signal fits more than one reason the least specific correct one
/// wins. Signals that fit nothing become `Unreachable` carrying the detail.
///
/// ```rust
/// use snmp_credcheck::{EngineSignal, OutcomeClassifier, RejectReason, SecurityLevel, SnmpVersion};
/// use snmp_credcheck::engine::SecurityHint;
///
/// let signal = EngineSignal::Security { hint: SecurityHint::SilentDrop, detail: String::new() };
/// let result = OutcomeClassifier::classify(SnmpVersion::V3, Some(SecurityLevel::AuthPriv), &signal);
/// assert_eq!(result.reason(), Some(RejectReason::WrongPrivKey));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomeClassifier;

impl OutcomeClassifier {
    /// `level` is ignored for SNMPv2c; `None` for v3 is read as noAuthNoPriv.
    pub fn classify(
        version: SnmpVersion,
        level: Option<SecurityLevel>,
        signal: &EngineSignal,
    ) -> ValidationResult {
        match signal {
            EngineSignal::Success { value } => ValidationResult::Accepted {
                value: value.clone(),
            },
            EngineSignal::Timeout { .. } => ValidationResult::Timeout,
            EngineSignal::Transport { detail }
            | EngineSignal::Protocol { detail }
            | EngineSignal::Unrecognized { detail } => ValidationResult::Unreachable {
                detail: detail.clone(),
            },
            EngineSignal::Security { hint, .. } => ValidationResult::Rejected {
                reason: match version {
                    SnmpVersion::V2c => RejectReason::WrongCommunity,
                    SnmpVersion::V3 => v3_reason(level.unwrap_or_default(), *hint),
                },
            },
        }
    }
}

fn v3_reason(level: SecurityLevel, hint: SecurityHint) -> RejectReason {
    match hint {
        // undecryptable scoped PDUs are dropped without a report
        SecurityHint::SilentDrop | SecurityHint::Decryption if level.requires_priv() => {
            RejectReason::WrongPrivKey
        }
        SecurityHint::WrongDigest if level.requires_auth() => RejectReason::WrongAuthKey,
        SecurityHint::UnsupportedLevel => RejectReason::UnsupportedSecurityLevel,
        SecurityHint::SilentDrop
        | SecurityHint::Decryption
        | SecurityHint::WrongDigest
        | SecurityHint::AccessDenied
        | SecurityHint::UnknownUser
        | SecurityHint::UnverifiedResponse
        | SecurityHint::Generic => RejectReason::WrongUserOrAuth,
    }
}
