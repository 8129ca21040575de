use super::types::{Binding, Response, SnmpValue};
use crate::error::{ProtocolError, SnmpResult};
use crate::oid::OidPath;
use crate::session::{AuthProtocol, PrivProtocol, Security, SessionConfig, UsmCredentials};
use snmp2::{Oid, SyncSession};
use std::str::FromStr;
use std::time::Duration;

/// One request/response exchange with an agent.
///
/// Implementations perform a single attempt; retry policy lives in the engine.
pub trait Transport {
    fn get(&mut self, oid: &OidPath) -> SnmpResult<Response>;
    fn get_next(&mut self, oid: &OidPath) -> SnmpResult<Response>;
}

#[derive(Debug, Clone, Copy)]
enum RequestKind {
    Get,
    GetNext,
}

/// UDP transport backed by an `snmp2` synchronous session.
///
/// The socket is closed when the transport is dropped.
pub struct Snmp2Transport {
    session: SyncSession,
}

impl Snmp2Transport {
    /// Open a socket to the target. For SNMPv3 this also runs engine ID
    /// discovery, which costs a round trip.
    pub fn open(config: &SessionConfig) -> SnmpResult<Self> {
        let addr = config.address();
        let timeout = Some(config.timeout());

        let session = match config.security() {
            Security::Community(community) => {
                SyncSession::new_v2c(&addr, community.expose().as_bytes(), timeout, 1).map_err(
                    |e| {
                        ProtocolError::Transport(format!(
                            "Failed to create v2c session to {}: {:?}",
                            addr, e
                        ))
                    },
                )?
            }
            Security::UserAuthPriv(usm) => {
                create_v3_session(&addr, timeout, usm, config.retries())?
            }
        };

        tracing::debug!("Opened {} session to {}", config.mode_name(), addr);
        Ok(Self { session })
    }

    fn call(&mut self, kind: RequestKind, oid: &OidPath) -> SnmpResult<Response> {
        let target = to_snmp2_oid(oid)?;

        resend_on_auth_update(|| self.exchange(kind, &target)).map_err(map_snmp_error)?
    }

    /// Send one PDU and copy the response out of the session's receive buffer.
    fn exchange(
        &mut self,
        kind: RequestKind,
        target: &Oid<'_>,
    ) -> Result<SnmpResult<Response>, snmp2::Error> {
        let pdu = match kind {
            RequestKind::Get => self.session.get(target)?,
            RequestKind::GetNext => self.session.getnext(target)?,
        };

        let error_status = pdu.error_status;
        let error_index = pdu.error_index;
        let bindings = pdu
            .varbinds
            .map(|(name, value)| {
                let oid = OidPath::from_str(&name.to_string()).map_err(|_| {
                    ProtocolError::MalformedResponse(format!("Invalid OID from response: {}", name))
                })?;
                Ok(Binding::new(oid, convert_value(value)))
            })
            .collect::<SnmpResult<Vec<_>>>();

        Ok(bindings.map(|bindings| Response {
            error_status,
            error_index,
            bindings,
        }))
    }
}

impl Transport for Snmp2Transport {
    fn get(&mut self, oid: &OidPath) -> SnmpResult<Response> {
        self.call(RequestKind::Get, oid)
    }

    fn get_next(&mut self, oid: &OidPath) -> SnmpResult<Response> {
        self.call(RequestKind::GetNext, oid)
    }
}

/// Create an authPriv session and discover the agent's engine ID
fn create_v3_session(
    addr: &str,
    timeout: Option<Duration>,
    usm: &UsmCredentials,
    retries: u32,
) -> SnmpResult<SyncSession> {
    use snmp2::v3::{Auth, Security as UsmSecurity};

    let auth = Auth::AuthPriv {
        cipher: cipher(usm.priv_protocol),
        privacy_password: usm.priv_passphrase.expose().as_bytes().to_vec(),
    };
    let security = UsmSecurity::new(
        usm.username.as_bytes(),
        usm.auth_passphrase.expose().as_bytes(),
    )
    .with_auth(auth)
    .with_auth_protocol(auth_protocol(usm.auth_protocol));

    let mut session = SyncSession::new_v3(addr, timeout, 1, security).map_err(|e| {
        ProtocolError::Transport(format!("SNMPv3 session creation failed: {:?}", e))
    })?;

    retry_on_receive(addr, retries, || session.init())?;
    Ok(session)
}

/// Run one exchange, sending it a second time if the agent answered with
/// fresh engine ID / boots / time. The re-send does not use the retry budget.
fn resend_on_auth_update<R>(
    mut exchange: impl FnMut() -> Result<R, snmp2::Error>,
) -> Result<R, snmp2::Error> {
    // First attempt (may fail with AuthUpdated when the engine was rediscovered)
    match exchange() {
        Err(snmp2::Error::AuthUpdated) => {
            tracing::debug!("SNMPv3 engine ID discovered, retrying request");
            // Security parameters are now current; a second AuthUpdated is an error
            exchange()
        }
        other => other,
    }
}

/// Engine ID discovery with `retries` extra attempts after a receive timeout
fn retry_on_receive<R>(
    addr: &str,
    retries: u32,
    mut init: impl FnMut() -> Result<R, snmp2::Error>,
) -> SnmpResult<R> {
    let attempts = retries + 1;
    for attempt in 1..=attempts {
        match init() {
            Ok(value) => return Ok(value),
            // Discovery request lost or agent slow to answer
            Err(snmp2::Error::Receive) if attempt < attempts => {
                tracing::debug!(
                    "Engine ID discovery for {} timed out (attempt {}/{}), retrying",
                    addr,
                    attempt,
                    attempts
                );
            }
            Err(e) => return Err(map_snmp_error(e)),
        }
    }

    Err(ProtocolError::Timeout)
}

fn auth_protocol(protocol: AuthProtocol) -> snmp2::v3::AuthProtocol {
    use snmp2::v3::AuthProtocol as P;

    match protocol {
        AuthProtocol::Md5 => P::Md5,
        AuthProtocol::Sha1 => P::Sha1,
        AuthProtocol::Sha224 => P::Sha224,
        AuthProtocol::Sha256 => P::Sha256,
        AuthProtocol::Sha384 => P::Sha384,
        AuthProtocol::Sha512 => P::Sha512,
    }
}

fn cipher(protocol: PrivProtocol) -> snmp2::v3::Cipher {
    use snmp2::v3::Cipher;

    match protocol {
        PrivProtocol::Des => Cipher::Des,
        PrivProtocol::Aes128 => Cipher::Aes128,
        PrivProtocol::Aes192 => Cipher::Aes192,
        PrivProtocol::Aes256 => Cipher::Aes256,
    }
}

fn to_snmp2_oid(oid: &OidPath) -> SnmpResult<Oid<'static>> {
    Oid::from_str(&oid.to_string())
        .map_err(|_| ProtocolError::MalformedResponse(format!("Cannot encode OID: {}", oid)))
}

/// Map snmp2 errors to ours
fn map_snmp_error(err: snmp2::Error) -> ProtocolError {
    match err {
        snmp2::Error::Receive => ProtocolError::Timeout,
        snmp2::Error::Send => ProtocolError::Transport("send failed".into()),
        snmp2::Error::CommunityMismatch => ProtocolError::Auth("community mismatch".into()),
        snmp2::Error::AuthFailure(kind) => ProtocolError::Auth(format!("{:?}", kind)),
        other => ProtocolError::MalformedResponse(format!("{:?}", other)),
    }
}

/// Convert snmp2::Value to an owned SnmpValue
fn convert_value(value: snmp2::Value) -> SnmpValue {
    use snmp2::Value as V;

    match value {
        V::Integer(i) => SnmpValue::Integer(i),
        V::OctetString(bytes) => SnmpValue::OctetString(bytes.to_vec()),
        V::ObjectIdentifier(oid) => match OidPath::from_str(&oid.to_string()) {
            Ok(path) => SnmpValue::ObjectId(path),
            Err(_) => SnmpValue::Unsupported(oid.to_string()),
        },
        V::IpAddress(ip) => SnmpValue::IpAddress(ip),
        V::Counter32(c) => SnmpValue::Counter32(c),
        V::Counter64(c) => SnmpValue::Counter64(c),
        V::Unsigned32(g) => SnmpValue::Gauge32(g),
        V::Timeticks(t) => SnmpValue::TimeTicks(t),
        V::Opaque(bytes) => SnmpValue::Opaque(bytes.to_vec()),
        V::Null => SnmpValue::Null,
        V::NoSuchObject => SnmpValue::NoSuchObject,
        V::NoSuchInstance => SnmpValue::NoSuchInstance,
        V::EndOfMibView => SnmpValue::EndOfMibView,
        other => SnmpValue::Unsupported(format!("{:?}", other)),
    }
}
