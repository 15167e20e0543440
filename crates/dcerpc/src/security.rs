//! Bind-time security configuration and the credential boundary
//!
//! Credentials are opaque to the RPC core: they are carried in a
//! [`SecurityConfig`] and handed to [`Transport::bind`](crate::Transport::bind)
//! untouched. Nothing here is ever marshaled into a stub.

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Authentication types (MS-RPCE Section 2.2.1.1.7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AuthType {
    #[default]
    None = 0,
    /// GSS Negotiate (SPNEGO)
    GssNegotiate = 9,
    /// Windows NT LAN Manager (NTLM)
    Ntlm = 10,
    /// GSS Kerberos
    GssKerberos = 16,
    /// Netlogon secure channel
    Netlogon = 68,
}

impl AuthType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            9 => Some(Self::GssNegotiate),
            10 => Some(Self::Ntlm),
            16 => Some(Self::GssKerberos),
            68 => Some(Self::Netlogon),
            _ => None,
        }
    }
}

/// Authentication levels (MS-RPCE Section 2.2.1.1.8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum AuthLevel {
    #[default]
    None = 1,
    Connect = 2,
    Call = 3,
    Pkt = 4,
    /// Sign each packet
    PktIntegrity = 5,
    /// Encrypt each packet
    PktPrivacy = 6,
}

impl AuthLevel {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::None),
            2 => Some(Self::Connect),
            3 => Some(Self::Call),
            4 => Some(Self::Pkt),
            5 => Some(Self::PktIntegrity),
            6 => Some(Self::PktPrivacy),
            _ => None,
        }
    }

    pub fn requires_signing(&self) -> bool {
        matches!(self, Self::PktIntegrity | Self::PktPrivacy)
    }

    pub fn requires_encryption(&self) -> bool {
        matches!(self, Self::PktPrivacy)
    }
}

/// Secret material behind a credential.
#[derive(Clone, PartialEq, Eq)]
pub enum Secret {
    Password(String),
    /// MD4 of the UTF-16LE password
    NtHash([u8; 16]),
    /// Raw Kerberos key with its encryption type
    EncryptionKey { etype: i32, key: Bytes },
    /// Keytab file contents
    Keytab(Bytes),
    /// Credential cache contents
    CredentialCache(Bytes),
}

impl Secret {
    pub fn kind(&self) -> &'static str {
        match self {
            Secret::Password(_) => "password",
            Secret::NtHash(_) => "nt_hash",
            Secret::EncryptionKey { .. } => "encryption_key",
            Secret::Keytab(_) => "keytab",
            Secret::CredentialCache(_) => "ccache",
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({}, <redacted>)", self.kind())
    }
}

/// Authentication material supplied by the caller.
pub trait Credential: Send + Sync {
    fn user_name(&self) -> &str;

    fn domain_name(&self) -> &str;

    fn workstation(&self) -> &str {
        ""
    }

    fn secret(&self) -> &Secret;
}

/// Credential held in memory.
#[derive(Clone)]
pub struct StaticCredential {
    user_name: String,
    domain_name: String,
    workstation: String,
    secret: Secret,
}

impl StaticCredential {
    pub fn new(user_name: impl Into<String>, domain_name: impl Into<String>, secret: Secret) -> Self {
        Self {
            user_name: user_name.into(),
            domain_name: domain_name.into(),
            workstation: String::new(),
            secret,
        }
    }

    pub fn password(
        user_name: impl Into<String>,
        domain_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(user_name, domain_name, Secret::Password(password.into()))
    }

    pub fn with_workstation(mut self, workstation: impl Into<String>) -> Self {
        self.workstation = workstation.into();
        self
    }
}

impl Credential for StaticCredential {
    fn user_name(&self) -> &str {
        &self.user_name
    }

    fn domain_name(&self) -> &str {
        &self.domain_name
    }

    fn workstation(&self) -> &str {
        &self.workstation
    }

    fn secret(&self) -> &Secret {
        &self.secret
    }
}

impl fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredential")
            .field("user_name", &self.user_name)
            .field("domain_name", &self.domain_name)
            .field("workstation", &self.workstation)
            .field("secret", &self.secret)
            .finish()
    }
}

/// Security context configuration
#[derive(Clone, Default)]
pub struct SecurityConfig {
    pub auth_type: AuthType,
    pub auth_level: AuthLevel,
    /// Target service principal name (for Kerberos)
    pub target_spn: Option<String>,
    pub credential: Option<Arc<dyn Credential>>,
}

impl SecurityConfig {
    pub fn new(auth_type: AuthType, auth_level: AuthLevel) -> Self {
        Self {
            auth_type,
            auth_level,
            ..Default::default()
        }
    }

    pub fn with_spn(mut self, spn: impl Into<String>) -> Self {
        self.target_spn = Some(spn.into());
        self
    }

    pub fn with_credential(mut self, credential: Arc<dyn Credential>) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_type != AuthType::None && self.auth_level > AuthLevel::None
    }
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("auth_type", &self.auth_type)
            .field("auth_level", &self.auth_level)
            .field("target_spn", &self.target_spn)
            .field(
                "credential",
                &self
                    .credential
                    .as_ref()
                    .map(|c| format!("{}\\{}", c.domain_name(), c.user_name())),
            )
            .finish()
    }
}
