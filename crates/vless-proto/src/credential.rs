//! The 16-byte client credential.

use std::fmt;
use std::str::FromStr;

use subtle::ConstantTimeEq;

/// Credential length in bytes.
pub const CREDENTIAL_LEN: usize = 16;

/// A 16-byte secret, written as a UUID in configuration.
#[derive(Clone, Copy)]
pub struct Credential([u8; CREDENTIAL_LEN]);

/// Returned when a credential string is not a UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialParseError;

impl fmt::Display for CredentialParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("credential must be a UUID (8-4-4-4-12 hex) or 32 hex digits")
    }
}

impl std::error::Error for CredentialParseError {}

impl Credential {
    pub const fn from_bytes(bytes: [u8; CREDENTIAL_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CREDENTIAL_LEN] {
        &self.0
    }

    /// Constant-time, all-or-nothing comparison against untrusted bytes.
    pub fn matches(&self, candidate: &[u8]) -> bool {
        candidate.len() == CREDENTIAL_LEN && bool::from(self.0.ct_eq(candidate))
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for Credential {}

impl FromStr for Credential {
    type Err = CredentialParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut hex_digits = [0u8; CREDENTIAL_LEN * 2];
        match s.len() {
            32 => hex_digits.copy_from_slice(s.as_bytes()),
            36 => {
                let mut n = 0;
                for (i, b) in s.bytes().enumerate() {
                    if matches!(i, 8 | 13 | 18 | 23) {
                        if b != b'-' {
                            return Err(CredentialParseError);
                        }
                        continue;
                    }
                    hex_digits[n] = b;
                    n += 1;
                }
            }
            _ => return Err(CredentialParseError),
        }
        let mut bytes = [0u8; CREDENTIAL_LEN];
        hex::decode_to_slice(hex_digits, &mut bytes).map_err(|_| CredentialParseError)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = hex::encode(self.0);
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &h[0..8],
            &h[8..12],
            &h[12..16],
            &h[16..20],
            &h[20..32]
        )
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "d342d11e-d424-4583-b36e-524ab1f0afa4";

    #[test]
    fn parse_hyphenated_and_bare() {
        let a: Credential = UUID.parse().unwrap();
        let b: Credential = "D342D11ED4244583B36E524AB1F0AFA4".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_bytes()[0], 0xd3);
        assert_eq!(a.as_bytes()[15], 0xa4);
        assert_eq!(a.to_string(), UUID);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!("".parse::<Credential>().is_err());
        assert!("d342d11e-d424-4583-b36e-524ab1f0afa".parse::<Credential>().is_err());
        assert!("d342d11ed-424-4583-b36e-524ab1f0afa4".parse::<Credential>().is_err());
        assert!("g342d11e-d424-4583-b36e-524ab1f0afa4".parse::<Credential>().is_err());
    }

    #[test]
    fn matches_is_all_or_nothing() {
        let cred: Credential = UUID.parse().unwrap();
        let mut bytes = *cred.as_bytes();
        assert!(cred.matches(&bytes));

        bytes[15] ^= 0x01;
        assert!(!cred.matches(&bytes));
        assert!(!cred.matches(&cred.as_bytes()[..15]));
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let cred: Credential = UUID.parse().unwrap();
        assert_eq!(format!("{cred:?}"), "Credential(..)");
    }
}
