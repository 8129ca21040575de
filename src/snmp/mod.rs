mod engine;
mod session;
mod transport;
mod types;

pub use engine::QueryEngine;
pub use session::Session;
pub use transport::{Snmp2Transport, Transport};
pub use types::{Binding, Response, SnmpValue, WalkResult};

#[cfg(test)]
pub(crate) use engine::tests as testing;
