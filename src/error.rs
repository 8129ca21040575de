use crate::oid::OidPath;
use thiserror::Error;

/// Failure of a single SNMP exchange, or of a walk built from several.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("request timed out")]
    Timeout,
    #[error("authentication failure: {0}")]
    Auth(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("device reported {} (status {status}) at varbind index {index}", error_status_name(*status))]
    ErrorStatus { status: u32, index: u32 },
    #[error("OID not increasing: {current} returned after {previous}")]
    NotIncreasing { previous: OidPath, current: OidPath },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("session closed")]
    SessionClosed,
}

pub type SnmpResult<T> = std::result::Result<T, ProtocolError>;

/// An OID that cannot be interpreted the way the caller needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed OID '{oid}': {reason}")]
pub struct MalformedOidError {
    pub oid: String,
    pub reason: String,
}

impl MalformedOidError {
    pub fn new(oid: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            reason: reason.into(),
        }
    }
}

/// Elapsed time between two counter samples was not strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("non-positive elapsed time between samples: {elapsed_secs}s")]
pub struct ClockError {
    pub elapsed_secs: f64,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    MalformedOid(#[from] MalformedOidError),
    #[error(transparent)]
    Clock(#[from] ClockError),
    #[error("sampling cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

/// RFC 3416 error-status names
pub fn error_status_name(status: u32) -> &'static str {
    match status {
        0 => "noError",
        1 => "tooBig",
        2 => "noSuchName",
        3 => "badValue",
        4 => "readOnly",
        5 => "genErr",
        6 => "noAccess",
        7 => "wrongType",
        8 => "wrongLength",
        9 => "wrongEncoding",
        10 => "wrongValue",
        11 => "noCreation",
        12 => "inconsistentValue",
        13 => "resourceUnavailable",
        14 => "commitFailed",
        15 => "undoFailed",
        16 => "authorizationError",
        17 => "notWritable",
        18 => "inconsistentName",
        _ => "unknownError",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        assert_eq!(format!("{}", ProtocolError::Timeout), "request timed out");
        assert_eq!(
            format!("{}", ProtocolError::Auth("wrong digest".to_string())),
            "authentication failure: wrong digest"
        );
        assert_eq!(format!("{}", ProtocolError::SessionClosed), "session closed");
    }

    #[test]
    fn test_error_status_display_names_status_and_index() {
        let err = ProtocolError::ErrorStatus {
            status: 5,
            index: 1,
        };
        assert_eq!(
            format!("{}", err),
            "device reported genErr (status 5) at varbind index 1"
        );
    }

    #[test]
    fn test_error_status_name_unknown() {
        assert_eq!(error_status_name(2), "noSuchName");
        assert_eq!(error_status_name(18), "inconsistentName");
        assert_eq!(error_status_name(99), "unknownError");
    }

    #[test]
    fn test_clock_error_display() {
        let err = ClockError { elapsed_secs: 0.0 };
        assert_eq!(
            format!("{}", err),
            "non-positive elapsed time between samples: 0s"
        );
    }

    #[test]
    fn test_umbrella_error_from() {
        let err: Error = MalformedOidError::new("1.2.3", "too short").into();
        assert!(matches!(err, Error::MalformedOid(_)));
        assert_eq!(format!("{}", err), "malformed OID '1.2.3': too short");
    }
}
