use crate::error::EscrowError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 20-byte party address, written as `0x` followed by 40 hex digits.
///
/// Parsing accepts either case; display is always lowercase so that two
/// spellings of the same address compare and hash equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub const LEN: usize = 20;

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Address {
    type Err = EscrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| EscrowError::ValidationError(format!("address {s:?} must start with 0x")))?;

        let bytes = hex::decode(digits)
            .map_err(|e| EscrowError::ValidationError(format!("address {s:?}: {e}")))?;

        let bytes: [u8; 20] = bytes.try_into().map_err(|_| {
            EscrowError::ValidationError(format!(
                "address {s:?} must be {} bytes long",
                Self::LEN
            ))
        })?;

        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The side a caller must be on for an operation to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Buyer,
    Seller,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Buyer => f.write_str("buyer"),
            Role::Seller => f.write_str("seller"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case() {
        let upper: Address = "0xABCDEF0000000000000000000000000000000001".parse().unwrap();
        let lower: Address = "0xabcdef0000000000000000000000000000000001".parse().unwrap();
        assert_eq!(upper, lower);
        assert_eq!(
            upper.to_string(),
            "0xabcdef0000000000000000000000000000000001"
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            "abcdef0000000000000000000000000000000001".parse::<Address>(),
            Err(EscrowError::ValidationError(_))
        ));
        assert!(matches!(
            "0x1234".parse::<Address>(),
            Err(EscrowError::ValidationError(_))
        ));
        assert!(matches!(
            "0xzz00000000000000000000000000000000000001".parse::<Address>(),
            Err(EscrowError::ValidationError(_))
        ));
    }

    #[test]
    fn test_address_json_representation() {
        let address = Address::new([0x11; 20]);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"0x1111111111111111111111111111111111111111\"");

        let parsed: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, address);
    }
}
