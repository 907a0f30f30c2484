//! What the client presents to the agent.
//!
//! ```rust
//! use snmp_credcheck::client::Auth;
//! use snmp_credcheck::{AuthProtocol, PrivProtocol, SecurityLevel};
//!
//! let auth = Auth::usm("admin")
//!     .auth(AuthProtocol::Sha256, "authpassword")
//!     .privacy(PrivProtocol::Aes128, "privpassword");
//! assert_eq!(auth.security_level(), SecurityLevel::AuthPriv);
//! ```

use bytes::Bytes;
use zeroize::Zeroizing;

use crate::error::Result;
use crate::message::SecurityLevel;
use crate::v3::{AuthProtocol, KeyExtension, LocalizedKey, MasterKey, PrivKey, PrivProtocol};

/// Credentials for one request.
#[derive(Clone)]
pub enum Auth {
    /// SNMPv2c community string. Empty is a valid community.
    Community(Bytes),
    /// SNMPv3 User-based Security Model.
    Usm(UsmAuth),
}

impl Auth {
    pub fn v2c(community: impl Into<Bytes>) -> Self {
        Auth::Community(community.into())
    }

    /// Start a USM user at noAuthNoPriv.
    pub fn usm(username: impl Into<Bytes>) -> UsmAuth {
        UsmAuth::new(username)
    }
}

impl From<UsmAuth> for Auth {
    fn from(usm: UsmAuth) -> Self {
        Auth::Usm(usm)
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Community(_) => f.write_str("Community([REDACTED])"),
            Auth::Usm(usm) => usm.fmt(f),
        }
    }
}

/// USM user with optional authentication and privacy secrets.
#[derive(Clone)]
pub struct UsmAuth {
    pub username: Bytes,
    auth: Option<(AuthProtocol, Zeroizing<Vec<u8>>)>,
    privacy: Option<Privacy>,
}

#[derive(Clone)]
struct Privacy {
    protocol: PrivProtocol,
    password: Zeroizing<Vec<u8>>,
    extension: KeyExtension,
}

impl UsmAuth {
    pub fn new(username: impl Into<Bytes>) -> Self {
        Self {
            username: username.into(),
            auth: None,
            privacy: None,
        }
    }

    pub fn auth(mut self, protocol: AuthProtocol, password: impl AsRef<[u8]>) -> Self {
        self.auth = Some((protocol, Zeroizing::new(password.as_ref().to_vec())));
        self
    }

    /// Privacy with the protocol's usual key extension.
    pub fn privacy(self, protocol: PrivProtocol, password: impl AsRef<[u8]>) -> Self {
        let extension = protocol.default_key_extension();
        self.privacy_with_extension(protocol, password, extension)
    }

    pub fn privacy_with_extension(
        mut self,
        protocol: PrivProtocol,
        password: impl AsRef<[u8]>,
        extension: KeyExtension,
    ) -> Self {
        self.privacy = Some(Privacy {
            protocol,
            password: Zeroizing::new(password.as_ref().to_vec()),
            extension,
        });
        self
    }

    /// Level implied by the configured secrets. Privacy without
    /// authentication is ignored.
    pub fn security_level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (None, _) => SecurityLevel::NoAuthNoPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
        }
    }

    /// Run the password expansions. Independent of the engine, so this can
    /// happen while discovery is in flight or on a blocking thread.
    pub fn master_keys(&self) -> MasterKeys {
        let Some((auth_protocol, auth_password)) = &self.auth else {
            return MasterKeys::default();
        };
        let privacy = self.privacy.as_ref().map(|p| {
            (
                MasterKey::from_password(*auth_protocol, &p.password),
                p.protocol,
                p.extension,
            )
        });
        MasterKeys {
            auth: Some(MasterKey::from_password(*auth_protocol, auth_password)),
            privacy,
        }
    }
}

impl std::fmt::Debug for UsmAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsmAuth")
            .field("username", &String::from_utf8_lossy(&self.username))
            .field("auth", &self.auth.as_ref().map(|(p, _)| p))
            .field("privacy", &self.privacy.as_ref().map(|p| p.protocol))
            .finish()
    }
}

/// Engine-independent keys for one user.
#[derive(Debug, Clone, Default)]
pub struct MasterKeys {
    auth: Option<MasterKey>,
    privacy: Option<(MasterKey, PrivProtocol, KeyExtension)>,
}

impl MasterKeys {
    /// Bind to a discovered engine.
    pub fn localize(&self, engine_id: &[u8]) -> Result<UsmKeys> {
        let auth = self.auth.as_ref().map(|key| key.localize(engine_id));
        let privacy = match &self.privacy {
            Some((master, protocol, extension)) => Some(PrivKey::from_master_key(
                master, *protocol, engine_id, *extension,
            )?),
            None => None,
        };
        Ok(UsmKeys { auth, privacy })
    }
}

/// Keys localized to one engine.
#[derive(Debug, Default)]
pub struct UsmKeys {
    pub auth: Option<LocalizedKey>,
    pub privacy: Option<PrivKey>,
}
