//! Participant identities.
//!
//! An identity is the HASH160 of a compressed secp256k1 public key, the same 20 bytes a P2WPKH
//! address commits to. Identities are what the engine recovers from reveal signatures and what
//! the owner capability is checked against.

use crate::{error::Result, MarketError};
use bitcoin::{hashes::Hash, PubkeyHash, PublicKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identity of a market participant or of the owner.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Identity(PubkeyHash);

impl Identity {
    /// Identity controlled by the given public key.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self(public_key.pubkey_hash())
    }

    /// Identity controlled by the given secret key (compressed encoding).
    pub fn from_secret_key(secret_key: &secp256k1::SecretKey) -> Self {
        let secp = secp256k1::Secp256k1::signing_only();
        Self::from_public_key(&PublicKey::new(secret_key.public_key(&secp)))
    }

    /// Raw 20-byte key hash
    pub fn to_byte_array(&self) -> [u8; 20] {
        self.0.to_byte_array()
    }
}

impl From<PubkeyHash> for Identity {
    fn from(hash: PubkeyHash) -> Self {
        Self(hash)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Identity {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        PubkeyHash::from_str(s)
            .map(Self)
            .map_err(|e| MarketError::InvalidIdentity(format!("{s}: {e}")))
    }
}

// Serialized as a hex string so identities can key JSON maps.
impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Identity::from_str(&s).map_err(serde::de::Error::custom)
    }
}
