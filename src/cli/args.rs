//! Command-line arguments.
//!
//! Flag names follow the net-snmp tools (`-v`, `-c`, `-u`, `-l`, `-a`, `-A`,
//! `-x`, `-X`, `-t`, `-r`).

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use super::{Prepared, UsmInput};
use crate::credential::{CredentialSpec, DEFAULT_OID, DEFAULT_PORT};
use crate::engine::EngineConfig;
use crate::message::SecurityLevel;
use crate::v3::KeyExtension;
use crate::validator::ValidatorConfig;

/// SNMP version for CLI argument parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum VersionArg {
    /// SNMPv2c (default)
    #[default]
    #[value(name = "2c", alias = "2")]
    V2c,
    /// SNMPv3
    #[value(name = "3")]
    V3,
}

/// Output format for CLI tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per result; rejections on stderr.
    #[default]
    Human,
    /// One JSON object per result on stdout.
    Json,
}

/// Check SNMP credentials against one or more agents.
#[derive(Debug, Parser)]
#[command(name = "snmp-credcheck", version, about)]
pub struct Args {
    /// Agents to check: host, host:port, [v6]:port or udp:host:port.
    #[arg(value_name = "TARGET", required_unless_present = "inventory")]
    pub targets: Vec<String>,

    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub v3: V3Args,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Run the checks listed in a YAML inventory instead.
    #[arg(long = "inventory", value_name = "FILE", conflicts_with = "targets")]
    pub inventory: Option<PathBuf>,

    /// Checks in flight at once.
    #[arg(long = "concurrency", default_value = "32")]
    pub concurrency: usize,
}

/// Arguments shared by every check on the command line.
#[derive(Debug, Parser)]
pub struct CommonArgs {
    /// SNMP version: 2c or 3. Implied 3 when -u is given.
    #[arg(short = 'v', long = "snmp-version")]
    pub snmp_version: Option<VersionArg>,

    /// Community string (v2c).
    #[arg(short = 'c', long = "community", default_value = "public")]
    pub community: String,

    /// Wait per attempt in seconds.
    #[arg(short = 't', long = "timeout", default_value = "2")]
    pub timeout: f64,

    /// Resends after the first attempt.
    #[arg(short = 'r', long = "retries", default_value = "1")]
    pub retries: u32,

    /// Port used when a target does not name one.
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// OID to GET.
    #[arg(long = "oid", default_value = DEFAULT_OID)]
    pub oid: String,

    /// Do not send a v3 discovery next to v2c requests.
    #[arg(long = "no-liveness-probe")]
    pub no_liveness_probe: bool,
}

impl CommonArgs {
    pub fn timeout_duration(&self) -> Result<Duration, String> {
        Duration::try_from_secs_f64(self.timeout)
            .map_err(|_| format!("invalid timeout '{}'", self.timeout))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            liveness_probe: !self.no_liveness_probe,
            ..EngineConfig::default()
        }
    }
}

/// SNMPv3 security arguments.
#[derive(Debug, Parser)]
pub struct V3Args {
    /// Security name/username (implies -v 3).
    #[arg(short = 'u', long = "username")]
    pub username: Option<String>,

    /// Security level: noAuthNoPriv, authNoPriv or authPriv. Inferred from
    /// the keys given when omitted.
    #[arg(short = 'l', long = "level")]
    pub level: Option<SecurityLevel>,

    /// Authentication protocol: MD5, SHA, SHA-224, SHA-256, SHA-384, SHA-512
    /// or none. MD5 when only -A is given.
    #[arg(short = 'a', long = "auth-protocol")]
    pub auth_protocol: Option<String>,

    /// Authentication passphrase.
    #[arg(short = 'A', long = "auth-password")]
    pub auth_password: Option<String>,

    /// Privacy protocol: DES, 3DES, AES, AES-192, AES-256 or none. DES when
    /// only -X is given.
    #[arg(short = 'x', long = "priv-protocol")]
    pub priv_protocol: Option<String>,

    /// Privacy passphrase.
    #[arg(short = 'X', long = "priv-password")]
    pub priv_password: Option<String>,

    /// Key extension for long privacy keys: none, blumenthal or reeder.
    #[arg(long = "key-extension")]
    pub key_extension: Option<KeyExtension>,
}

impl V3Args {
    pub fn is_v3(&self) -> bool {
        self.username.is_some()
    }

    fn input(&self) -> UsmInput<'_> {
        UsmInput {
            username: self.username.as_deref().unwrap_or_default(),
            level: self.level,
            auth_protocol: self.auth_protocol.as_deref(),
            auth_key: self.auth_password.as_deref(),
            priv_protocol: self.priv_protocol.as_deref(),
            priv_key: self.priv_password.as_deref(),
            key_extension: self.key_extension,
        }
    }
}

/// Output control arguments.
#[derive(Debug, Parser)]
pub struct OutputArgs {
    /// Output format: human or json.
    #[arg(short = 'O', long = "output", default_value = "human")]
    pub format: OutputFormat,

    /// Enable debug logging (snmp_credcheck=debug).
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Enable trace logging (snmp_credcheck=trace).
    #[arg(short = 'D', long = "trace")]
    pub trace: bool,
}

impl OutputArgs {
    /// Install a stderr subscriber. `RUST_LOG` wins over the flags.
    pub fn init_tracing(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = if self.trace {
            "snmp_credcheck=trace"
        } else if self.debug {
            "snmp_credcheck=debug"
        } else {
            "snmp_credcheck=warn"
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
            )
            .with_writer(std::io::stderr)
            .try_init();
    }
}

impl Args {
    pub fn version(&self) -> VersionArg {
        match self.common.snmp_version {
            Some(version) => version,
            None if self.v3.is_v3() => VersionArg::V3,
            None => VersionArg::V2c,
        }
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            concurrency: self.concurrency,
            ..ValidatorConfig::default()
        }
    }

    /// One spec per target.
    pub fn specs(&self) -> Vec<Prepared> {
        self.targets.iter().map(|target| self.spec(target)).collect()
    }

    fn spec(&self, target: &str) -> Prepared {
        let (host, port) = parse_target(target, self.common.port)?;
        let timeout = self.common.timeout_duration()?;
        let spec = match self.version() {
            VersionArg::V2c => CredentialSpec::v2c(host, self.common.community.clone()),
            VersionArg::V3 => CredentialSpec::v3(host, self.v3.input().resolve()?),
        };
        Ok(spec
            .port(port)
            .timeout(timeout)
            .retries(self.common.retries)
            .oid(self.common.oid.clone()))
    }
}

/// Split a net-snmp style target into host and port.
///
/// ```
/// use snmp_credcheck::cli::args::parse_target;
///
/// assert_eq!(parse_target("udp:router:1161", 161).unwrap(), ("router".into(), 1161));
/// assert_eq!(parse_target("[2001:db8::1]:162", 161).unwrap(), ("2001:db8::1".into(), 162));
/// assert_eq!(parse_target("2001:db8::1", 161).unwrap(), ("2001:db8::1".into(), 161));
/// ```
pub fn parse_target(target: &str, default_port: u16) -> Result<(String, u16), String> {
    let text = target.trim();
    let text = ["udp:", "udp6:", "udpv6:"]
        .iter()
        .find_map(|prefix| text.strip_prefix(prefix))
        .unwrap_or(text);
    let bad_port = |port: &str| format!("invalid port '{port}' in target '{target}'");

    if let Some(rest) = text.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| format!("unterminated '[' in target '{target}'"))?;
        let port = match tail.strip_prefix(':') {
            Some(port) => port.parse().map_err(|_| bad_port(port))?,
            None if tail.is_empty() => default_port,
            None => return Err(format!("unexpected '{tail}' in target '{target}'")),
        };
        return Ok((host.to_string(), port));
    }

    match text.rsplit_once(':') {
        // more than one colon: a bare IPv6 literal
        Some((host, _)) if host.contains(':') => Ok((text.to_string(), default_port)),
        Some((host, port)) => Ok((host.to_string(), port.parse().map_err(|_| bad_port(port))?)),
        None => Ok((text.to_string(), default_port)),
    }
}
