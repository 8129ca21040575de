use crate::error::{ProtocolError, SnmpResult};
use crate::oid::OidPath;
use std::fmt;

/// Value carried in a varbind
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    ObjectId(OidPath),
    IpAddress([u8; 4]),
    Counter32(u32),
    Counter64(u64),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Null,
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    Unsupported(String),
}

impl SnmpValue {
    /// Value as an unsigned counter reading. Negative integers are not counters.
    pub fn as_counter(&self) -> Option<u64> {
        match self {
            SnmpValue::Counter32(v) => Some(u64::from(*v)),
            SnmpValue::Counter64(v) => Some(*v),
            SnmpValue::Gauge32(v) => Some(u64::from(*v)),
            SnmpValue::Integer(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// v2 exception values that stand in for a missing object.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            SnmpValue::NoSuchObject | SnmpValue::NoSuchInstance | SnmpValue::EndOfMibView
        )
    }
}

impl fmt::Display for SnmpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpValue::Integer(v) => write!(f, "{}", v),
            SnmpValue::OctetString(bytes) => match printable(bytes) {
                Some(text) => f.write_str(text),
                None => write_hex(f, bytes),
            },
            SnmpValue::ObjectId(oid) => write!(f, "{}", oid),
            SnmpValue::IpAddress(ip) => write!(f, "{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3]),
            SnmpValue::Counter32(v) | SnmpValue::Gauge32(v) | SnmpValue::TimeTicks(v) => {
                write!(f, "{}", v)
            }
            SnmpValue::Counter64(v) => write!(f, "{}", v),
            SnmpValue::Opaque(bytes) => write_hex(f, bytes),
            SnmpValue::Null => f.write_str(""),
            SnmpValue::NoSuchObject => f.write_str("noSuchObject"),
            SnmpValue::NoSuchInstance => f.write_str("noSuchInstance"),
            SnmpValue::EndOfMibView => f.write_str("endOfMibView"),
            SnmpValue::Unsupported(s) => f.write_str(s),
        }
    }
}

fn printable(bytes: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(bytes).ok()?;
    let text = text.trim_end_matches('\0');
    if text.chars().all(|c| !c.is_control() || c == '\t') {
        Some(text)
    } else {
        None
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    f.write_str("0x")?;
    for b in bytes {
        write!(f, "{:02x}", b)?;
    }
    Ok(())
}

/// One (OID, value) pair returned by the device
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub oid: OidPath,
    pub value: SnmpValue,
}

impl Binding {
    pub fn new(oid: OidPath, value: SnmpValue) -> Self {
        Self { oid, value }
    }
}

/// Bindings from one walk, in the order the device returned them
pub type WalkResult = Vec<Binding>;

/// Decoded response PDU
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Response {
    pub error_status: u32,
    pub error_index: u32,
    pub bindings: Vec<Binding>,
}

impl Response {
    pub fn ok(bindings: Vec<Binding>) -> Self {
        Self {
            error_status: 0,
            error_index: 0,
            bindings,
        }
    }

    /// Turn a non-zero error-status into an error
    pub fn check_status(self) -> SnmpResult<Self> {
        if self.error_status != 0 {
            return Err(ProtocolError::ErrorStatus {
                status: self.error_status,
                index: self.error_index,
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snmp_value_as_counter() {
        assert_eq!(SnmpValue::Counter32(u32::MAX).as_counter(), Some(4294967295));
        assert_eq!(SnmpValue::Counter64(u64::MAX).as_counter(), Some(u64::MAX));
        assert_eq!(SnmpValue::Integer(7).as_counter(), Some(7));
        assert_eq!(SnmpValue::Integer(-1).as_counter(), None);
        assert_eq!(SnmpValue::TimeTicks(5).as_counter(), None);
        assert_eq!(SnmpValue::Null.as_counter(), None);
    }

    #[test]
    fn test_snmp_value_display() {
        assert_eq!(SnmpValue::OctetString(b"eth0".to_vec()).to_string(), "eth0");
        assert_eq!(
            SnmpValue::OctetString(vec![0x00, 0x1a, 0x2b, 0xff]).to_string(),
            "0x001a2bff"
        );
        assert_eq!(SnmpValue::IpAddress([10, 0, 0, 1]).to_string(), "10.0.0.1");
        assert_eq!(SnmpValue::EndOfMibView.to_string(), "endOfMibView");
    }

    #[test]
    fn test_is_exception() {
        assert!(SnmpValue::NoSuchObject.is_exception());
        assert!(SnmpValue::NoSuchInstance.is_exception());
        assert!(SnmpValue::EndOfMibView.is_exception());
        assert!(!SnmpValue::Null.is_exception());
    }

    #[test]
    fn test_check_status() {
        let ok = Response::ok(Vec::new());
        assert!(ok.check_status().is_ok());

        let failed = Response {
            error_status: 2,
            error_index: 1,
            bindings: Vec::new(),
        };
        assert_eq!(
            failed.check_status(),
            Err(ProtocolError::ErrorStatus {
                status: 2,
                index: 1
            })
        );
    }
}
