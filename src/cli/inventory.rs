//! YAML regression inventory: named checks with expected outcomes.
//!
//! ```yaml
//! defaults:
//!   port: 161
//!   timeout: 2
//!   retries: 1
//! checks:
//!   - name: core router, v2c
//!     host: 192.0.2.1
//!     version: 2c
//!     community: public
//!     expect: accepted
//!   - name: wrong priv key
//!     host: 192.0.2.1
//!     version: 3
//!     username: admin
//!     auth_protocol: SHA
//!     auth_key: authpassword
//!     priv_protocol: AES
//!     priv_key: not-the-key
//!     expect: wrong_priv_key
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::{Prepared, UsmInput};
use crate::credential::{
    CredentialSpec, DEFAULT_OID, DEFAULT_PORT, DEFAULT_RETRIES, DEFAULT_TIMEOUT, SnmpVersion,
};
use crate::message::SecurityLevel;
use crate::outcome::{RejectReason, ValidationResult};
use crate::v3::KeyExtension;

/// Inventory file could not be used.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid inventory: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inventory {
    #[serde(default)]
    pub defaults: Defaults,
    pub checks: Vec<Check>,
}

/// Fallbacks for fields a check leaves out.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Defaults {
    pub port: u16,
    /// Seconds.
    pub timeout: f64,
    pub retries: u32,
    pub oid: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT.as_secs_f64(),
            retries: DEFAULT_RETRIES,
            oid: DEFAULT_OID.to_string(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Check {
    pub name: String,
    pub host: String,
    pub port: Option<u16>,
    pub version: SnmpVersion,
    pub community: Option<String>,
    pub username: Option<String>,
    pub security_level: Option<SecurityLevel>,
    pub auth_protocol: Option<String>,
    pub auth_key: Option<String>,
    pub priv_protocol: Option<String>,
    pub priv_key: Option<String>,
    pub key_extension: Option<KeyExtension>,
    pub timeout: Option<f64>,
    pub retries: Option<u32>,
    pub oid: Option<String>,
    pub expect: Option<Expectation>,
}

impl Inventory {
    pub fn from_yaml(text: &str) -> Result<Self, InventoryError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        let text = std::fs::read_to_string(path).map_err(|source| InventoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// One spec per check, in file order.
    pub fn specs(&self) -> Vec<Prepared> {
        self.checks.iter().map(|check| check.spec(&self.defaults)).collect()
    }
}

impl Check {
    pub fn spec(&self, defaults: &Defaults) -> Prepared {
        let seconds = self.timeout.unwrap_or(defaults.timeout);
        let timeout = Duration::try_from_secs_f64(seconds)
            .map_err(|_| format!("invalid timeout {seconds} in check '{}'", self.name))?;

        let spec = match self.version {
            SnmpVersion::V2c => {
                CredentialSpec::v2c(&self.host, self.community.clone().unwrap_or_default())
            }
            SnmpVersion::V3 => {
                let usm = UsmInput {
                    username: self.username.as_deref().unwrap_or_default(),
                    level: self.security_level,
                    auth_protocol: self.auth_protocol.as_deref(),
                    auth_key: self.auth_key.as_deref(),
                    priv_protocol: self.priv_protocol.as_deref(),
                    priv_key: self.priv_key.as_deref(),
                    key_extension: self.key_extension,
                }
                .resolve()?;
                CredentialSpec::v3(&self.host, usm)
            }
        };

        Ok(spec
            .port(self.port.unwrap_or(defaults.port))
            .timeout(timeout)
            .retries(self.retries.unwrap_or(defaults.retries))
            .oid(self.oid.clone().unwrap_or_else(|| defaults.oid.clone())))
    }

    /// `None` when the check states no expectation.
    pub fn passes(&self, result: &ValidationResult) -> Option<bool> {
        self.expect.map(|expect| expect.matches(result))
    }
}

/// Expected outcome of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    Accepted,
    /// Any rejection.
    Rejected,
    Reason(RejectReason),
    Unreachable,
    Timeout,
    ConfigurationError,
}

impl Expectation {
    pub fn matches(self, result: &ValidationResult) -> bool {
        match (self, result) {
            (Self::Accepted, ValidationResult::Accepted { .. })
            | (Self::Rejected, ValidationResult::Rejected { .. })
            | (Self::Unreachable, ValidationResult::Unreachable { .. })
            | (Self::Timeout, ValidationResult::Timeout)
            | (Self::ConfigurationError, ValidationResult::ConfigurationError { .. }) => true,
            (Self::Reason(expected), ValidationResult::Rejected { reason }) => expected == *reason,
            _ => false,
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => f.write_str("accepted"),
            Self::Rejected => f.write_str("rejected"),
            Self::Reason(reason) => reason.fmt(f),
            Self::Unreachable => f.write_str("unreachable"),
            Self::Timeout => f.write_str("timeout"),
            Self::ConfigurationError => f.write_str("configuration_error"),
        }
    }
}

impl FromStr for Expectation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "unreachable" => Ok(Self::Unreachable),
            "timeout" => Ok(Self::Timeout),
            "configuration_error" => Ok(Self::ConfigurationError),
            _ => s
                .parse()
                .map(Self::Reason)
                .map_err(|_| format!("unknown expectation '{s}'")),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Expectation {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
