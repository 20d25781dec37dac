//! Destination address decoding.

use std::fmt::Write;
use std::net::Ipv4Addr;

use crate::HandshakeError;
use crate::cursor::Cursor;

pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x02;
pub const ATYP_IPV6: u8 = 0x03;

/// Offset of the family byte relative to `addr_offset` (after command + port).
pub const FAMILY_OFFSET: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Domain,
    Ipv6,
}

impl AddressFamily {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            ATYP_IPV4 => Some(AddressFamily::Ipv4),
            ATYP_DOMAIN => Some(AddressFamily::Domain),
            ATYP_IPV6 => Some(AddressFamily::Ipv6),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            AddressFamily::Ipv4 => ATYP_IPV4,
            AddressFamily::Domain => ATYP_DOMAIN,
            AddressFamily::Ipv6 => ATYP_IPV6,
        }
    }
}

/// A decoded destination host.
///
/// `end` is the blob offset just past the address bytes; anything after it
/// is payload for the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub family: AddressFamily,
    pub host: String,
    pub end: usize,
}

/// Decode the address section that starts at `addr_offset`.
///
/// The family byte sits at `addr_offset + 3`. Any read past the end of the
/// blob or an unknown family yields `InvalidAddress`. Domain bytes are
/// decoded lossily and may be empty; such a host simply fails to dial.
pub fn resolve_address(blob: &[u8], addr_offset: usize) -> Result<Address, HandshakeError> {
    let start = addr_offset
        .checked_add(FAMILY_OFFSET)
        .ok_or(HandshakeError::InvalidAddress)?;
    let mut cur = Cursor::at(blob, start);
    let family = cur
        .read_u8()
        .and_then(AddressFamily::from_code)
        .ok_or(HandshakeError::InvalidAddress)?;

    let host = match family {
        AddressFamily::Ipv4 => {
            let octets = cur.read_array::<4>().ok_or(HandshakeError::InvalidAddress)?;
            Ipv4Addr::from(octets).to_string()
        }
        AddressFamily::Domain => {
            let len = cur.read_u8().ok_or(HandshakeError::InvalidAddress)? as usize;
            let name = cur.read_bytes(len).ok_or(HandshakeError::InvalidAddress)?;
            String::from_utf8_lossy(name).into_owned()
        }
        AddressFamily::Ipv6 => {
            let raw = cur.read_array::<16>().ok_or(HandshakeError::InvalidAddress)?;
            format_ipv6_groups(&raw)
        }
    };

    Ok(Address {
        family,
        host,
        end: cur.position(),
    })
}

/// Eight lowercase hex groups joined by `:`, without zero compression.
pub fn format_ipv6_groups(raw: &[u8; 16]) -> String {
    let mut out = String::with_capacity(39);
    for (i, pair) in raw.chunks_exact(2).enumerate() {
        if i > 0 {
            out.push(':');
        }
        let group = u16::from_be_bytes([pair[0], pair[1]]);
        let _ = write!(out, "{group:x}");
    }
    out
}
