//! `host:port` endpoint parsing.

use crate::loader::ConfigError;

/// Split `"host:port"` into an owned host and a port.
///
/// IPv6 literals use brackets: `"[::1]:443"` yields `("::1", 443)`.
pub fn parse_host_port(addr: &str) -> Result<(String, u16), ConfigError> {
    let invalid = || ConfigError::Validation(format!("invalid endpoint '{addr}', expected host:port"));

    let (host, port_str) = if let Some(rest) = addr.strip_prefix('[') {
        rest.split_once("]:").ok_or_else(invalid)?
    } else {
        let (host, port_str) = addr.rsplit_once(':').ok_or_else(invalid)?;
        // A bare IPv6 literal has more than one colon and needs brackets.
        if host.contains(':') {
            return Err(invalid());
        }
        (host, port_str)
    };

    if host.is_empty() {
        return Err(invalid());
    }
    let port = port_str.parse::<u16>().map_err(|_| invalid())?;
    if port == 0 {
        return Err(invalid());
    }
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_and_ipv4() {
        assert_eq!(
            parse_host_port("relay.example.net:443").unwrap(),
            ("relay.example.net".to_string(), 443)
        );
        assert_eq!(
            parse_host_port("10.0.0.2:8443").unwrap(),
            ("10.0.0.2".to_string(), 8443)
        );
    }

    #[test]
    fn bracketed_ipv6() {
        assert_eq!(
            parse_host_port("[2001:db8::1]:443").unwrap(),
            ("2001:db8::1".to_string(), 443)
        );
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["relay.example.net", ":443", "host:", "host:0", "host:70000", "::1:443", "[::1]443"] {
            assert!(parse_host_port(bad).is_err(), "{bad} should be rejected");
        }
    }
}
