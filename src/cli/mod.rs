//! Command-line front end for the `snmp-credcheck` binary.
//!
//! Enabled by the `cli` feature (on by default).

pub mod args;
pub mod inventory;
pub mod output;

use crate::credential::{CredentialSpec, UsmCredentials};
use crate::engine::SnmpEngine;
use crate::message::SecurityLevel;
use crate::outcome::ValidationResult;
use crate::v3::{AuthProtocol, KeyExtension, PrivProtocol};
use crate::validator::CredentialValidator;

/// Loose USM settings as typed by a user or written in an inventory file.
#[derive(Debug, Default, Clone)]
pub struct UsmInput<'a> {
    pub username: &'a str,
    pub level: Option<SecurityLevel>,
    pub auth_protocol: Option<&'a str>,
    pub auth_key: Option<&'a str>,
    pub priv_protocol: Option<&'a str>,
    pub priv_key: Option<&'a str>,
    pub key_extension: Option<KeyExtension>,
}

impl UsmInput<'_> {
    /// Fill the gaps the way net-snmp users expect.
    ///
    /// Without a level, the level follows the keys given. A key without a
    /// protocol means MD5 or DES. Contradictions are kept so validation can
    /// report them.
    pub fn resolve(&self) -> Result<UsmCredentials, String> {
        let auth_key = self.auth_key.unwrap_or_default();
        let priv_key = self.priv_key.unwrap_or_default();

        let auth_protocol = match self.auth_protocol {
            Some(name) => AuthProtocol::parse_optional(name).map_err(|e| e.to_string())?,
            None if !auth_key.is_empty() => Some(AuthProtocol::Md5),
            None => None,
        };
        let priv_protocol = match self.priv_protocol {
            Some(name) => PrivProtocol::parse_optional(name).map_err(|e| e.to_string())?,
            None if !priv_key.is_empty() => Some(PrivProtocol::Des),
            None => None,
        };

        let mut usm = UsmCredentials {
            username: self.username.to_string(),
            auth_protocol,
            auth_key: auth_key.to_string(),
            priv_protocol,
            priv_key: priv_key.to_string(),
            key_extension: self.key_extension,
            ..UsmCredentials::new("")
        };
        usm.security_level = self.level.unwrap_or_else(|| usm.inferred_level());
        Ok(usm)
    }
}

/// A spec, or the reason one could not be built.
pub type Prepared = Result<CredentialSpec, String>;

/// Validate every prepared check. Order is preserved; unbuildable checks
/// become configuration errors without touching the network.
pub async fn run_checks<E: SnmpEngine>(
    validator: &CredentialValidator<E>,
    prepared: Vec<Prepared>,
) -> Vec<ValidationResult> {
    let mut results: Vec<Option<ValidationResult>> = Vec::with_capacity(prepared.len());
    let mut specs = Vec::new();
    let mut slots = Vec::new();
    for (i, item) in prepared.into_iter().enumerate() {
        match item {
            Ok(spec) => {
                specs.push(spec);
                slots.push(i);
                results.push(None);
            }
            Err(detail) => results.push(Some(ValidationResult::ConfigurationError { detail })),
        }
    }

    for (slot, result) in slots.into_iter().zip(validator.validate_many(specs).await) {
        results[slot] = Some(result);
    }
    results
        .into_iter()
        .map(|r| r.unwrap_or(ValidationResult::Timeout))
        .collect()
}

/// Exit status for a run: 0 only if everything was accepted, otherwise the
/// highest category code seen.
pub fn exit_code(results: &[ValidationResult]) -> u8 {
    results.iter().map(ValidationResult::exit_code).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::RejectReason;

    #[test]
    fn level_inferred_from_keys() {
        let usm = UsmInput {
            username: "admin",
            auth_key: Some("maplesyrup"),
            priv_key: Some("maplesyrup"),
            ..UsmInput::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(usm.security_level, SecurityLevel::AuthPriv);
        assert_eq!(usm.auth_protocol, Some(AuthProtocol::Md5));
        assert_eq!(usm.priv_protocol, Some(PrivProtocol::Des));

        let usm = UsmInput {
            username: "admin",
            auth_protocol: Some("usmHMAC192SHA256AuthProtocol"),
            auth_key: Some("maplesyrup"),
            ..UsmInput::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(usm.security_level, SecurityLevel::AuthNoPriv);
        assert_eq!(usm.auth_protocol, Some(AuthProtocol::Sha256));
    }

    #[test]
    fn explicit_level_is_kept() {
        let usm = UsmInput {
            username: "admin",
            level: Some(SecurityLevel::AuthPriv),
            ..UsmInput::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(usm.security_level, SecurityLevel::AuthPriv);
        assert!(CredentialSpec::v3("h", usm).validate().is_err());
    }

    #[test]
    fn none_protocol_names() {
        let usm = UsmInput {
            username: "admin",
            auth_protocol: Some("usmNoAuthProtocol"),
            priv_protocol: Some("none"),
            ..UsmInput::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(usm.auth_protocol, None);
        assert_eq!(usm.priv_protocol, None);
        assert!(
            UsmInput {
                username: "admin",
                auth_protocol: Some("rot13"),
                ..UsmInput::default()
            }
            .resolve()
            .is_err()
        );
    }

    #[test]
    fn exit_code_is_worst_category() {
        let accepted = ValidationResult::Accepted { value: "x".into() };
        assert_eq!(exit_code(&[]), 0);
        assert_eq!(exit_code(&[accepted.clone(), accepted.clone()]), 0);
        assert_eq!(
            exit_code(&[
                accepted,
                ValidationResult::Rejected {
                    reason: RejectReason::WrongCommunity
                },
                ValidationResult::Timeout
            ]),
            3
        );
    }
}
