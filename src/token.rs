//! Opaque 32-byte token and pool identifiers.
//!
//! `TokenId` wraps a Solana mint address. We only ever need equality and
//! hashing over it (never signing or derivation), so `Pubkey` is used
//! purely as a convenient, already-`Copy`, 32-byte newtype base.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(pub Pubkey);

impl TokenId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(Pubkey::new_from_array(bytes))
    }
}

impl FromStr for TokenId {
    type Err = solana_sdk::pubkey::ParsePubkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Pubkey::from_str(s)?))
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 32-byte pool address, unique per venue. Same representation as
/// `TokenId`, kept as a distinct type so the two are never confused at
/// call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolAddress(pub Pubkey);

impl FromStr for PoolAddress {
    type Err = solana_sdk::pubkey::ParsePubkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Pubkey::from_str(s)?))
    }
}

impl fmt::Display for PoolAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_id_equality_and_hash_only() {
        let a = TokenId::new([1u8; 32]);
        let b = TokenId::new([1u8; 32]);
        let c = TokenId::new([2u8; 32]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn pool_address_parses_base58() {
        let addr: PoolAddress = "11111111111111111111111111111111"
            .parse()
            .expect("valid base58 pubkey");
        assert_eq!(addr.0, Pubkey::default());
    }
}
