use crate::secret::SecretString;
use crate::session::{
    AuthProtocol, PrivProtocol, SessionConfig, UsmCredentials, DEFAULT_PORT, DEFAULT_RETRIES,
    DEFAULT_TIMEOUT,
};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid targets file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("target {0}: set either a community or v3 credentials")]
    MissingSecurity(String),
    #[error("target {0}: community and v3 credentials are mutually exclusive")]
    ConflictingSecurity(String),
}

/// One device to poll, as listed in a targets file
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub community: Option<SecretString>,
    #[serde(default)]
    pub v3: Option<V3Config>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retries: Option<u32>,
}

/// SNMPv3 authPriv settings
#[derive(Debug, Clone, Deserialize)]
pub struct V3Config {
    pub username: String,
    pub auth_passphrase: SecretString,
    pub priv_passphrase: SecretString,
    #[serde(default = "default_auth_protocol")]
    pub auth_protocol: AuthProtocol,
    #[serde(default = "default_priv_protocol")]
    pub priv_protocol: PrivProtocol,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_auth_protocol() -> AuthProtocol {
    AuthProtocol::Sha1
}

fn default_priv_protocol() -> PrivProtocol {
    PrivProtocol::Des
}

impl TargetConfig {
    pub fn to_session_config(&self) -> Result<SessionConfig, ConfigError> {
        let config = match (&self.community, &self.v3) {
            (Some(community), None) => SessionConfig::community(&self.host, community.clone()),
            (None, Some(v3)) => SessionConfig::user_auth_priv(
                &self.host,
                UsmCredentials {
                    username: v3.username.clone(),
                    auth_passphrase: v3.auth_passphrase.clone(),
                    priv_passphrase: v3.priv_passphrase.clone(),
                    auth_protocol: v3.auth_protocol,
                    priv_protocol: v3.priv_protocol,
                },
            ),
            (None, None) => return Err(ConfigError::MissingSecurity(self.host.clone())),
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingSecurity(self.host.clone())),
        };

        Ok(config
            .with_port(self.port)
            .with_timeout(
                self.timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_TIMEOUT),
            )
            .with_retries(self.retries.unwrap_or(DEFAULT_RETRIES)))
    }
}

/// Parse a JSON array of targets
pub fn parse_targets(json: &str) -> Result<Vec<TargetConfig>, ConfigError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_targets(path: &Path) -> Result<Vec<TargetConfig>, ConfigError> {
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_targets(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Security;

    #[test]
    fn test_parse_v2c_target_with_defaults() {
        let targets = parse_targets(r#"[{"host": "10.0.0.1", "community": "public"}]"#).unwrap();
        let config = targets[0].to_session_config().unwrap();

        assert_eq!(config.address(), "10.0.0.1:161");
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.retries(), DEFAULT_RETRIES);
        match config.security() {
            Security::Community(c) => assert_eq!(c.expose(), "public"),
            other => panic!("Expected community security, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_v3_target() {
        let json = r#"[{
            "host": "core1.example.net",
            "port": 1161,
            "timeout_ms": 500,
            "retries": 3,
            "v3": {
                "username": "poller",
                "auth_passphrase": "authpass123",
                "priv_passphrase": "privpass123",
                "auth_protocol": "SHA-256",
                "priv_protocol": "AES"
            }
        }]"#;

        let config = parse_targets(json).unwrap()[0].to_session_config().unwrap();

        assert_eq!(config.port(), 1161);
        assert_eq!(config.timeout(), Duration::from_millis(500));
        assert_eq!(config.retries(), 3);
        match config.security() {
            Security::UserAuthPriv(creds) => {
                assert_eq!(creds.username, "poller");
                assert_eq!(creds.auth_protocol, AuthProtocol::Sha256);
                assert_eq!(creds.priv_protocol, PrivProtocol::Aes128);
            }
            other => panic!("Expected v3 security, got {:?}", other),
        }
    }

    #[test]
    fn test_v3_protocol_defaults() {
        let json = r#"[{"host": "r1", "v3": {"username": "u", "auth_passphrase": "a", "priv_passphrase": "p"}}]"#;
        let target = &parse_targets(json).unwrap()[0];
        let v3 = target.v3.as_ref().unwrap();

        assert_eq!(v3.auth_protocol, AuthProtocol::Sha1);
        assert_eq!(v3.priv_protocol, PrivProtocol::Des);
    }

    #[test]
    fn test_target_security_must_be_exactly_one() {
        let none = &parse_targets(r#"[{"host": "r1"}]"#).unwrap()[0];
        assert!(matches!(
            none.to_session_config(),
            Err(ConfigError::MissingSecurity(_))
        ));

        let both = &parse_targets(
            r#"[{"host": "r1", "community": "c", "v3": {"username": "u", "auth_passphrase": "a", "priv_passphrase": "p"}}]"#,
        )
        .unwrap()[0];
        assert!(matches!(
            both.to_session_config(),
            Err(ConfigError::ConflictingSecurity(_))
        ));
    }

    #[test]
    fn test_unknown_protocol_rejected() {
        let json = r#"[{"host": "r1", "v3": {"username": "u", "auth_passphrase": "a", "priv_passphrase": "p", "auth_protocol": "ROT13"}}]"#;
        assert!(matches!(parse_targets(json), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_targets_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        std::fs::write(&path, r#"[{"host": "a", "community": "x"}, {"host": "b", "community": "y"}]"#)
            .unwrap();

        let targets = load_targets(&path).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1].host, "b");

        assert!(matches!(
            load_targets(&dir.path().join("nope.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
