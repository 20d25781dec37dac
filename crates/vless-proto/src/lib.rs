//! VLESS handshake parsing and serialization.
//!
//! A handshake blob is laid out as:
//!
//! ```text
//! +---------+------------+-------------+--------+-----+------+--------+------+---------+
//! | version | credential | addons len  | addons | cmd | port | family | addr | payload |
//! |    1    |     16     |      1      |   N    |  1  | 2 BE |   1    | var  |   ...   |
//! +---------+------------+-------------+--------+-----+------+--------+------+---------+
//! ```
//!
//! `addr_offset` (the position of `cmd`) is `18 + N`. Every offset derived
//! from the untrusted length fields goes through [`Cursor`], so parsing never
//! reads past the blob.

mod address;
mod credential;
mod cursor;
mod token;

pub use address::{
    ATYP_DOMAIN, ATYP_IPV4, ATYP_IPV6, Address, AddressFamily, format_ipv6_groups,
    resolve_address,
};
pub use credential::{CREDENTIAL_LEN, Credential, CredentialParseError};
pub use cursor::Cursor;
pub use token::{decode_token, encode_token};

use bytes::BytesMut;

/// Protocol version written by [`write_handshake`].
pub const VERSION: u8 = 0x00;
/// Offset of the addons length byte.
pub const OPTIONS_LEN_OFFSET: usize = 1 + CREDENTIAL_LEN;
/// Shortest blob that can carry version, credential and addons length.
pub const MIN_HANDSHAKE_LEN: usize = OPTIONS_LEN_OFFSET + 1;
/// Command + port + family.
pub const FIXED_HEADER_LEN: usize = 4;
/// Maximum domain name length.
pub const MAX_DOMAIN_LEN: usize = 255;
/// Maximum addons length.
pub const MAX_ADDONS_LEN: usize = 255;

pub const CMD_TCP: u8 = 0x01;
pub const CMD_UDP: u8 = 0x02;
pub const CMD_MUX: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeError {
    /// Token is not valid base64.
    MalformedEncoding,
    /// Blob ends before the fixed header is complete.
    TooShort,
    /// Credential does not match.
    Unauthorized,
    /// Address section is out of bounds or undecodable.
    InvalidAddress,
}

impl HandshakeError {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeError::MalformedEncoding => "malformed_encoding",
            HandshakeError::TooShort => "too_short",
            HandshakeError::Unauthorized => "unauthorized",
            HandshakeError::InvalidAddress => "invalid_address",
        }
    }
}

/// Errors that can occur when writing a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// Domain is empty or longer than 255 bytes.
    InvalidDomainLen,
    /// Addons longer than 255 bytes.
    AddonsTooLong,
}

/// The command byte. It is decoded but does not change relay behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Tcp,
    Udp,
    Mux,
    Other(u8),
}

impl Command {
    pub fn from_byte(b: u8) -> Self {
        match b {
            CMD_TCP => Command::Tcp,
            CMD_UDP => Command::Udp,
            CMD_MUX => Command::Mux,
            other => Command::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Command::Tcp => CMD_TCP,
            Command::Udp => CMD_UDP,
            Command::Mux => CMD_MUX,
            Command::Other(b) => b,
        }
    }
}

/// Validated fixed header of a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub version: u8,
    pub command: Command,
    pub port: u16,
    /// Position of the command byte; address parsing starts here.
    pub addr_offset: usize,
}

/// A fully decoded request: header, destination and trailing payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<'a> {
    pub header: Handshake,
    pub address: Address,
    pub payload: &'a [u8],
}

/// Host for [`write_handshake`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRef<'a> {
    Ipv4([u8; 4]),
    Ipv6([u8; 16]),
    Domain(&'a [u8]),
}

/// Validate version, credential and fixed header.
///
/// Checks run in order: minimum length, credential, then room for the
/// command/port/family header after the addons section.
pub fn parse_handshake(blob: &[u8], secret: &Credential) -> Result<Handshake, HandshakeError> {
    if blob.len() < MIN_HANDSHAKE_LEN {
        return Err(HandshakeError::TooShort);
    }
    let mut cur = Cursor::new(blob);
    let version = cur.read_u8().ok_or(HandshakeError::TooShort)?;
    let credential = cur
        .read_bytes(CREDENTIAL_LEN)
        .ok_or(HandshakeError::TooShort)?;
    if !secret.matches(credential) {
        return Err(HandshakeError::Unauthorized);
    }

    let addons_len = cur.read_u8().ok_or(HandshakeError::TooShort)? as usize;
    cur.skip(addons_len).ok_or(HandshakeError::TooShort)?;
    let addr_offset = cur.position();
    if cur.remaining() < FIXED_HEADER_LEN {
        return Err(HandshakeError::TooShort);
    }

    let command = Command::from_byte(cur.read_u8().ok_or(HandshakeError::TooShort)?);
    let port = cur.read_u16_be().ok_or(HandshakeError::TooShort)?;

    Ok(Handshake {
        version,
        command,
        port,
        addr_offset,
    })
}

/// Decode header and address, and split off the trailing payload.
pub fn decode_request<'a>(
    blob: &'a [u8],
    secret: &Credential,
) -> Result<Request<'a>, HandshakeError> {
    let header = parse_handshake(blob, secret)?;
    let address = resolve_address(blob, header.addr_offset)?;
    let payload = blob
        .get(address.end..)
        .ok_or(HandshakeError::InvalidAddress)?;
    Ok(Request {
        header,
        address,
        payload,
    })
}

/// Writes a handshake (without payload) to the buffer.
///
/// # Errors
/// - `AddonsTooLong` if addons exceed 255 bytes.
/// - `InvalidDomainLen` if a domain host is empty or longer than 255 bytes.
#[allow(clippy::cast_possible_truncation)]
pub fn write_handshake(
    buf: &mut BytesMut,
    credential: &Credential,
    addons: &[u8],
    command: Command,
    port: u16,
    host: &HostRef<'_>,
) -> Result<(), WriteError> {
    if addons.len() > MAX_ADDONS_LEN {
        return Err(WriteError::AddonsTooLong);
    }
    if let HostRef::Domain(d) = host
        && (d.is_empty() || d.len() > MAX_DOMAIN_LEN)
    {
        return Err(WriteError::InvalidDomainLen);
    }
    buf.extend_from_slice(&[VERSION]);
    buf.extend_from_slice(credential.as_bytes());
    buf.extend_from_slice(&[addons.len() as u8]);
    buf.extend_from_slice(addons);
    buf.extend_from_slice(&[command.as_byte()]);
    buf.extend_from_slice(&port.to_be_bytes());
    match host {
        HostRef::Ipv4(ip) => {
            buf.extend_from_slice(&[AddressFamily::Ipv4.code()]);
            buf.extend_from_slice(ip);
        }
        HostRef::Ipv6(ip) => {
            buf.extend_from_slice(&[AddressFamily::Ipv6.code()]);
            buf.extend_from_slice(ip);
        }
        HostRef::Domain(domain) => {
            buf.extend_from_slice(&[AddressFamily::Domain.code(), domain.len() as u8]);
            buf.extend_from_slice(domain);
        }
    }
    Ok(())
}
