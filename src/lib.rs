//! SNMP polling core: GET and WALK over v2c or v3 sessions, index-keyed
//! table correlation, counter-to-rate sampling and address decoding, plus
//! the interface, neighbor, system and traffic workflows built on them.

pub mod address;
pub mod config;
pub mod correlate;
pub mod discovery;
pub mod error;
pub mod export;
pub mod oid;
pub mod rate;
pub mod record;
pub mod render;
pub mod secret;
pub mod session;
pub mod sink;
pub mod snmp;
pub mod version;

pub use error::{ClockError, Error, MalformedOidError, ProtocolError, Result, SnmpResult};
pub use oid::OidPath;
pub use record::{FieldValue, Record};
pub use session::SessionConfig;
pub use sink::Sink;
pub use snmp::{Binding, Session, SnmpValue, WalkResult};
