//! IPv4 addresses encoded in table indexes (ipNetToMediaTable and friends).

use crate::error::MalformedOidError;
use crate::oid::OidPath;
use std::net::Ipv4Addr;

/// Decode the last four sub-identifiers of `oid` as an IPv4 address.
pub fn decode_ipv4(oid: &OidPath) -> Result<Ipv4Addr, MalformedOidError> {
    let suffix = oid.suffix(4).ok_or_else(|| {
        MalformedOidError::new(
            oid.to_string(),
            format!("need 4 sub-identifiers for an IPv4 address, found {}", oid.len()),
        )
    })?;

    let mut octets = [0u8; 4];
    for (octet, &sub) in octets.iter_mut().zip(suffix) {
        *octet = u8::try_from(sub).map_err(|_| {
            MalformedOidError::new(oid.to_string(), format!("sub-identifier {} exceeds 255", sub))
        })?;
    }

    Ok(Ipv4Addr::from(octets))
}

/// Dotted-decimal form of [`decode_ipv4`]
pub fn decode_ipv4_string(oid: &OidPath) -> Result<String, MalformedOidError> {
    decode_ipv4(oid).map(|ip| ip.to_string())
}
