//! Target address and credentials for one polling session.

use crate::secret::SecretString;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Standard SNMP agent port
pub const DEFAULT_PORT: u16 = 161;
/// Per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
/// Re-sends after a timed-out request
pub const DEFAULT_RETRIES: u32 = 1;

/// SNMPv3 authentication algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum AuthProtocol {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl FromStr for AuthProtocol {
    type Err = String;

    fn from_str(protocol: &str) -> Result<Self, Self::Err> {
        match protocol.trim().to_uppercase().as_str() {
            "MD5" => Ok(AuthProtocol::Md5),
            "SHA" | "SHA1" | "SHA-1" => Ok(AuthProtocol::Sha1),
            "SHA224" | "SHA-224" => Ok(AuthProtocol::Sha224),
            "SHA256" | "SHA-256" => Ok(AuthProtocol::Sha256),
            "SHA384" | "SHA-384" => Ok(AuthProtocol::Sha384),
            "SHA512" | "SHA-512" => Ok(AuthProtocol::Sha512),
            _ => Err(format!("Unsupported auth protocol: '{}'", protocol)),
        }
    }
}

impl TryFrom<String> for AuthProtocol {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// SNMPv3 privacy (encryption) algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum PrivProtocol {
    Des,
    Aes128,
    Aes192,
    Aes256,
}

impl FromStr for PrivProtocol {
    type Err = String;

    fn from_str(protocol: &str) -> Result<Self, Self::Err> {
        match protocol.trim().to_uppercase().as_str() {
            "DES" => Ok(PrivProtocol::Des),
            "AES" | "AES128" | "AES-128" => Ok(PrivProtocol::Aes128),
            "AES192" | "AES-192" => Ok(PrivProtocol::Aes192),
            "AES256" | "AES-256" | "AES-256-C" => Ok(PrivProtocol::Aes256),
            _ => Err(format!("Unsupported priv protocol: '{}'", protocol)),
        }
    }
}

impl TryFrom<String> for PrivProtocol {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// User-based security model material for authPriv
#[derive(Clone, PartialEq)]
pub struct UsmCredentials {
    pub username: String,
    pub auth_passphrase: SecretString,
    pub priv_passphrase: SecretString,
    pub auth_protocol: AuthProtocol,
    pub priv_protocol: PrivProtocol,
}

impl fmt::Debug for UsmCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsmCredentials")
            .field("username", &self.username)
            .field("auth_passphrase", &"[REDACTED]")
            .field("priv_passphrase", &"[REDACTED]")
            .field("auth_protocol", &self.auth_protocol)
            .field("priv_protocol", &self.priv_protocol)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Security {
    /// SNMPv2c
    Community(SecretString),
    /// SNMPv3 authPriv
    UserAuthPriv(UsmCredentials),
}

/// Everything needed to open a session. Immutable once built.
#[derive(Clone)]
pub struct SessionConfig {
    host: String,
    port: u16,
    security: Security,
    timeout: Duration,
    retries: u32,
}

impl SessionConfig {
    pub fn community(host: impl Into<String>, community: SecretString) -> Self {
        Self::new(host.into(), Security::Community(community))
    }

    pub fn user_auth_priv(host: impl Into<String>, credentials: UsmCredentials) -> Self {
        Self::new(host.into(), Security::UserAuthPriv(credentials))
    }

    fn new(host: String, security: Security) -> Self {
        Self {
            host,
            port: DEFAULT_PORT,
            security,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn security(&self) -> &Security {
        &self.security
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// `host:port`, bracketing bare IPv6 literals
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self.security {
            Security::Community(_) => "v2c",
            Security::UserAuthPriv(_) => "v3/authPriv",
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let credentials = match &self.security {
            Security::Community(community) => format!("community {}", community.hint()),
            Security::UserAuthPriv(usm) => format!("user {}", usm.username),
        };
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("mode", &self.mode_name())
            .field("credentials", &credentials)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish()
    }
}
