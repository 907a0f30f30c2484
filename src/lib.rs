//! # snmp-credcheck
//!
//! Check whether SNMP credentials work against a live agent, and if not,
//! why not.
//!
//! A check is a [`CredentialSpec`]: a target, an SNMPv2c community or an
//! SNMPv3 USM tuple, and an OID to GET (sysDescr.0 by default). The
//! [`CredentialValidator`] validates the spec, sends one GET through an
//! [`SnmpEngine`] and classifies what happened into a [`ValidationResult`]:
//!
//! - `Accepted`: the agent authenticated the request and answered it
//! - `Rejected`: the credentials were refused, with the most specific reason
//!   the protocol allows (wrong community, unknown user, wrong auth key,
//!   wrong priv key, unsupported security level)
//! - `Unreachable` / `Timeout`: a network problem, not a credential problem
//! - `ConfigurationError`: the spec contradicts itself; nothing was sent
//!
//! ## Features
//!
//! - SNMPv2c and SNMPv3 (USM) with MD5, SHA-1 and SHA-2 authentication and
//!   DES, 3DES and AES-128/192/256 privacy
//! - Engine discovery and time synchronisation within the same call
//! - Telling silent agents from dead ones with a liveness probe
//! - Concurrent batches with cancellation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snmp_credcheck::{AuthProtocol, CredentialSpec, CredentialValidator, PrivProtocol, UsmCredentials};
//!
//! #[tokio::main]
//! async fn main() {
//!     let validator = CredentialValidator::new();
//!
//!     let v2c = CredentialSpec::v2c("192.0.2.1", "public");
//!     println!("{}", validator.validate(&v2c).await);
//!
//!     let v3 = CredentialSpec::v3(
//!         "192.0.2.1",
//!         UsmCredentials::new("admin")
//!             .auth(AuthProtocol::Sha256, "authpass123")
//!             .privacy(PrivProtocol::Aes128, "privpass123"),
//!     );
//!     let result = validator.validate(&v3).await;
//!     if !result.is_accepted() {
//!         eprintln!("{result}");
//!     }
//! }
//! ```

pub mod ber;
pub mod classify;
pub mod client;
pub mod credential;
pub mod engine;
pub mod error;
pub mod format;
pub mod message;
pub mod oid;
pub mod outcome;
pub mod pdu;
pub mod probe;
pub mod transport;
pub mod v3;
pub mod validator;
pub mod value;
pub mod varbind;

pub(crate) mod util;

#[cfg(feature = "cli")]
pub mod cli;

pub use classify::OutcomeClassifier;
pub use credential::{CredentialSpec, Credentials, SnmpVersion, SpecError, UsmCredentials, ValidatedSpec};
pub use engine::{EngineConfig, EngineSignal, SecurityHint, SnmpEngine, UdpEngine};
pub use error::{Error, ErrorStatus, Result};
pub use message::SecurityLevel;
pub use oid::Oid;
pub use outcome::{RejectReason, ValidationResult};
pub use probe::CredentialProbe;
pub use v3::{AuthProtocol, KeyExtension, ParseProtocolError, PrivProtocol};
pub use validator::{CredentialValidator, ValidatorConfig};
pub use value::Value;
pub use varbind::VarBind;
